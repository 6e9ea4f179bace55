//! Outbound peer transport over HTTP.
//!
//! A server's endpoint speaks JSON-RPC 2.0: liveness probes are `ping`
//! requests and forwarded tool calls are `tools/call` requests, both posted
//! to the endpoint itself. Gossip goes to the peer's node API at
//! `{endpoint}/api/gossip`.

use crate::config::{PeerConfig, RetryConfig};
use crate::error::{ToolmeshError, ToolmeshResult};
use crate::transport::http::send_with_retry;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use toolmesh_core::{GossipMessage, PeerTransport, TransportError};
use tracing::debug;
use url::Url;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: String,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<ToolCallParams<'a>>,
}

#[derive(Debug, Serialize)]
struct ToolCallParams<'a> {
    name: &'a str,
    arguments: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// [`PeerTransport`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPeerTransport {
    client: Client,
    retry_config: RetryConfig,
}

impl HttpPeerTransport {
    pub fn new(config: PeerConfig) -> ToolmeshResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent())
            .build()?;
        Ok(Self {
            client,
            retry_config: config.retry_config,
        })
    }

    fn url(endpoint: &str, path: &str) -> ToolmeshResult<Url> {
        let mut base = Url::parse(endpoint)?;
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    async fn send_gossip(&self, endpoint: &str, message: &GossipMessage) -> ToolmeshResult<GossipMessage> {
        let url = Self::url(endpoint, "api/gossip")?;
        debug!(url = %url, servers = message.servers.len(), "Exchanging gossip");
        let request = self.client.post(url).json(message);
        Ok(send_with_retry(request, &self.retry_config).await?.json().await?)
    }

    async fn rpc(
        &self,
        endpoint: &str,
        method: &'static str,
        params: Option<ToolCallParams<'_>>,
    ) -> ToolmeshResult<serde_json::Value> {
        let url = Url::parse(endpoint)?;
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: uuid::Uuid::new_v4().to_string(),
            method,
            params,
        };
        debug!(url = %url, method, "JSON-RPC request to peer");

        let response: JsonRpcResponse = send_with_retry(self.client.post(url).json(&body), &self.retry_config)
            .await?
            .json()
            .await?;

        match (response.result, response.error) {
            (_, Some(error)) => Err(ToolmeshError::Rpc {
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(serde_json::Value::Null),
        }
    }
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn ping(&self, endpoint: &str) -> Result<(), TransportError> {
        self.rpc(endpoint, "ping", None).await?;
        Ok(())
    }

    async fn exchange_gossip(
        &self,
        endpoint: &str,
        message: &GossipMessage,
    ) -> Result<GossipMessage, TransportError> {
        Ok(self.send_gossip(endpoint, message).await?)
    }

    async fn call_tool(
        &self,
        endpoint: &str,
        tool: &str,
        params: &serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        let params = ToolCallParams {
            name: tool,
            arguments: params,
        };
        Ok(self.rpc(endpoint, "tools/call", Some(params)).await?)
    }
}
