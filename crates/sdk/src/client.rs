//! Main client for the toolmesh SDK.

use crate::api::*;
use crate::config::{ClientConfig, RetryConfig};
use crate::error::{ToolmeshError, ToolmeshResult};
use crate::transport::HttpTransport;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Client for one toolmesh node's HTTP API.
#[derive(Clone)]
pub struct ToolmeshClient {
    config: Arc<ClientConfig>,
    pub(crate) http: HttpTransport,
}

impl ToolmeshClient {
    /// Create a new client builder.
    pub fn builder() -> ToolmeshClientBuilder {
        ToolmeshClientBuilder::new()
    }

    fn from_config(config: ClientConfig) -> ToolmeshResult<Self> {
        let config = Arc::new(config);
        let http = HttpTransport::new(config.clone())?;

        Ok(Self { config, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.config.base_url
    }

    /// Get the health API.
    pub fn health(&self) -> HealthApi<'_> {
        HealthApi::new(self)
    }

    /// Get the servers API.
    pub fn servers(&self) -> ServersApi<'_> {
        ServersApi::new(self)
    }

    /// Get the tools API.
    pub fn tools(&self) -> ToolsApi<'_> {
        ToolsApi::new(self)
    }

    /// Get the network API.
    pub fn network(&self) -> NetworkApi<'_> {
        NetworkApi::new(self)
    }
}

/// Builder for creating a ToolmeshClient.
pub struct ToolmeshClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    retry_config: RetryConfig,
}

impl ToolmeshClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            user_agent: None,
            retry_config: RetryConfig::default(),
        }
    }

    /// Set the base URL of the node.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the `User-Agent` sent to the node.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the retry configuration.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Build the client.
    pub fn build(self) -> ToolmeshResult<ToolmeshClient> {
        let base_url_str = self
            .base_url
            .ok_or_else(|| ToolmeshError::Config("base_url is required".to_string()))?;

        let mut config = ClientConfig::new(Url::parse(&base_url_str)?);
        config.timeout = self.timeout;
        config.retry_config = self.retry_config;
        if let Some(user_agent) = self.user_agent {
            config.user_agent = user_agent;
        }

        ToolmeshClient::from_config(config)
    }
}

impl Default for ToolmeshClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolmesh_core::types::{SearchOptions, ServerFilter};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ToolmeshClient {
        ToolmeshClient::builder()
            .base_url(server.uri())
            .retry_config(RetryConfig::no_retry())
            .build()
            .unwrap()
    }

    fn server_json(id: &str, trust: f64) -> serde_json::Value {
        json!({
            "id": id,
            "name": format!("{id} server"),
            "endpoint": format!("http://{id}.test"),
            "owner": "owner",
            "tools": [{"name": "get_x", "description": "x", "category": "data"}],
            "trustScore": trust,
            "registeredAt": "2026-01-01T00:00:00Z",
            "lastSeenAt": "2026-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_builder_requires_base_url() {
        let result = ToolmeshClient::builder().build();
        assert!(matches!(result, Err(ToolmeshError::Config(_))));
    }

    #[tokio::test]
    async fn test_list_servers_sends_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/servers"))
            .and(query_param("minTrust", "50"))
            .and(query_param("hasTools", "a,c"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "servers": [server_json("s1", 90.0)],
                "count": 1
            })))
            .mount(&server)
            .await;

        let filter = ServerFilter {
            min_trust: Some(50.0),
            has_tools: vec!["a".to_string(), "c".to_string()],
            ..Default::default()
        };
        let servers = client(&server).servers().list(&filter).await.unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].id, "s1");
        assert_eq!(servers[0].trust_score, 90.0);
    }

    #[tokio::test]
    async fn test_search_and_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tools/search"))
            .and(query_param("q", "get"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [], "count": 0})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/call"))
            .and(body_partial_json(json!({"tool": "get_x"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "No servers found for tool get_x"
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let results = client.tools().search("get", &SearchOptions::default()).await.unwrap();
        assert!(results.is_empty());

        let result = client.tools().call_auto("get_x", json!({})).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("No servers found"));
    }

    #[tokio::test]
    async fn test_missing_server_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/servers/ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "server not found: ghost"})))
            .mount(&server)
            .await;

        let err = client(&server).servers().get("ghost").await.unwrap_err();
        assert!(matches!(err, ToolmeshError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_audit_posts_findings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/servers/a/audit"))
            .and(body_partial_json(json!({"auditedCode": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "trustScore": 48.5,
                "metrics": {
                    "uptime": 100.0,
                    "avgResponseTimeMs": 12.0,
                    "successRate": 100.0,
                    "totalRequests": 0,
                    "totalErrors": 0,
                    "qualityScore": 50.0,
                    "reportCount": 0,
                    "verifiedOwner": false,
                    "auditedCode": true
                }
            })))
            .mount(&server)
            .await;

        let audit = toolmesh_core::types::AuditRequest {
            quality_score: None,
            audited_code: Some(true),
        };
        let response = client(&server).servers().audit("a", &audit).await.unwrap();
        assert_eq!(response.trust_score, 48.5);
        assert!(response.metrics.audited_code);
        assert_eq!(response.metrics.successful_probes, 0);
    }
}
