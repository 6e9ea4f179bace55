use crate::config::{AppState, ServerConfig};
use crate::websocket;
use anyhow::Result;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use toolmesh_core::FederationError;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

mod handlers;

/// Start the node and serve its API until ctrl-c
pub async fn serve(addr: &str, config: ServerConfig) -> Result<()> {
    let state = AppState::new(&config, addr)?;
    let node = state.node.clone();
    node.start().await?;

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    node.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Create the API router
pub(crate) fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handlers::json_rpc))
        .route("/api/health", get(handlers::health_check))
        .route("/api/info", get(handlers::info))
        .route("/api/servers", get(handlers::list_servers))
        .route("/api/servers/{server_id}", get(handlers::get_server))
        .route("/api/servers/{server_id}/trust", get(handlers::get_trust_metrics))
        .route("/api/servers/{server_id}/reports", get(handlers::list_reports))
        .route("/api/servers/{server_id}/audit", post(handlers::record_audit))
        .route("/api/tools/search", get(handlers::search_tools))
        .route("/api/register", post(handlers::register))
        .route("/api/gossip", post(handlers::gossip))
        .route("/api/message", post(handlers::message))
        .route("/api/report", post(handlers::report))
        .route("/api/verify", post(handlers::verify_owner))
        .route("/api/call", post(handlers::call_tool))
        .route("/api/stats", get(handlers::stats))
        .route("/api/events", get(websocket::ws_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Custom error type for API handlers
pub struct ApiError(anyhow::Error);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<FederationError>() {
            Some(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            Some(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Some(FederationError::AlreadyRegistered(_)) => StatusCode::CONFLICT,
            Some(FederationError::Unreachable { .. }) | Some(FederationError::Transport(_)) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_msg = self.0.to_string();
        let details = self.0.chain().skip(1).map(|e| e.to_string()).collect::<Vec<_>>().join(": ");

        if status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.0);
        }

        let response = if details.is_empty() {
            ErrorResponse::new(error_msg)
        } else {
            ErrorResponse::with_details(error_msg, details)
        };

        (status, Json(response)).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use toolmesh_core::testing::test_server;
    use toolmesh_core::transport::MockTransport;
    use toolmesh_core::{
        Ed25519OwnershipVerifier, FederationConfig, FederationNode, MemoryServerStore,
        NodeIdentity,
    };
    use tower::ServiceExt;

    fn app() -> (Router, Arc<FederationNode>) {
        let config = FederationConfig {
            discovery_enabled: true,
            ..FederationConfig::isolated()
        };
        let identity = NodeIdentity {
            id: "node-under-test".to_string(),
            ..Default::default()
        };
        let node = Arc::new(FederationNode::new(
            config,
            identity,
            Arc::new(MemoryServerStore::new()),
            Arc::new(MockTransport::new()),
            Arc::new(Ed25519OwnershipVerifier),
        ));
        (create_router(AppState::with_node(node.clone())), node)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn server_body(id: &str, tools: &[&str]) -> Value {
        serde_json::to_value(test_server(id, tools)).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_info() {
        let (app, _) = app();
        let (status, body) = send(&app, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["nodeId"], "node-under-test");

        let (status, body) = send(&app, get("/api/info")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "node-under-test");
    }

    #[tokio::test]
    async fn test_register_then_list_and_get() {
        let (app, _) = app();
        let (status, body) = send(&app, post("/api/register", server_body("a", &["get_x"]))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["serverId"], "a");

        let (status, body) = send(&app, get("/api/servers")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["servers"][0]["trustScore"], 30.0);

        let (status, body) = send(&app, get("/api/servers/a")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["endpoint"], "http://a.test");

        let (status, body) = send(&app, get("/api/servers/a/trust")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reportCount"], 0);
    }

    #[tokio::test]
    async fn test_register_errors_map_to_status_codes() {
        let (app, _) = app();
        let mut invalid = server_body("bad", &["t"]);
        invalid["endpoint"] = json!("");
        let (status, body) = send(&app, post("/api/register", invalid)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("endpoint"));

        send(&app, post("/api/register", server_body("a", &["t"]))).await;
        let (status, _) = send(&app, post("/api/register", server_body("a", &["t"]))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, get("/api/servers/ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_filters_from_query() {
        let (app, node) = app();
        for (id, tools, trust) in [
            ("ab", vec!["a", "b"], 80.0),
            ("ac", vec!["a", "c"], 70.0),
            ("abc", vec!["a", "b", "c"], 20.0),
        ] {
            send(&app, post("/api/register", server_body(id, &tools))).await;
            node.registry().set_trust_score(id, trust).await;
        }

        let (_, body) = send(&app, get("/api/servers?hasTools=a,c")).await;
        let ids: Vec<&str> = body["servers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["ac", "abc"]);

        let (_, body) = send(&app, get("/api/servers?minTrust=50&limit=1")).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["servers"][0]["id"], "ab");
    }

    #[tokio::test]
    async fn test_search_ranks_by_trust() {
        let (app, node) = app();
        for (id, trust) in [("low", 30.0), ("high", 90.0)] {
            send(&app, post("/api/register", server_body(id, &["get_x"]))).await;
            node.registry().set_trust_score(id, trust).await;
        }

        let (status, body) = send(&app, get("/api/tools/search?q=get")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["results"][0]["serverId"], "high");
    }

    #[tokio::test]
    async fn test_call_refusals_are_data() {
        let (app, node) = app();
        send(&app, post("/api/register", server_body("a", &["quote"]))).await;

        let (status, body) = send(
            &app,
            post("/api/call", json!({"serverId": "a", "tool": "quote", "params": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("threshold"));

        node.registry().set_trust_score("a", 80.0).await;
        let (_, body) = send(&app, post("/api/call", json!({"tool": "quote"}))).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["serverId"], "a");
    }

    #[tokio::test]
    async fn test_gossip_message_report_stats() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            post("/api/gossip", json!({"servers": [server_body("g", &["t"])]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["servers"].as_array().unwrap().iter().any(|s| s["id"] == "g"));

        let (_, body) = send(
            &app,
            post(
                "/api/message",
                json!({"type": "ping", "senderId": "g", "timestamp": "2026-01-01T00:00:00Z"}),
            ),
        )
        .await;
        assert_eq!(body["received"], true);
        assert_eq!(body["type"], "pong");

        let (_, body) = send(&app, post("/api/report", json!({"serverId": "g", "reason": "spam"}))).await;
        assert_eq!(body["reported"], true);
        assert_eq!(body["reportCount"], 1);

        let (_, body) = send(&app, get("/api/servers/g/reports")).await;
        assert_eq!(body["reports"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, post("/api/report", json!({"serverId": "nope", "reason": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = send(&app, get("/api/stats")).await;
        assert_eq!(body["totalServers"], 1);
        assert_eq!(body["totalTools"], 1);
    }

    #[tokio::test]
    async fn test_verify_rejects_bad_proof() {
        let (app, _) = app();
        send(&app, post("/api/register", server_body("a", &["t"]))).await;
        let (status, body) = send(
            &app,
            post("/api/verify", json!({"serverId": "a", "proof": "00"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verified"], false);
    }

    #[tokio::test]
    async fn test_audit_route_feeds_trust() {
        let (app, _) = app();
        send(&app, post("/api/register", server_body("a", &["t"]))).await;

        let (status, body) = send(
            &app,
            post("/api/servers/a/audit", json!({"qualityScore": 100.0, "auditedCode": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metrics"]["auditedCode"], true);
        assert!(body["trustScore"].as_f64().unwrap() > 30.0);

        let (status, _) = send(&app, post("/api/servers/a/audit", json!({"qualityScore": -1.0}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, post("/api/servers/ghost/audit", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_node_answers_json_rpc_at_root() {
        let (app, node) = app();
        let (status, body) = send(&app, post("/", json!({"jsonrpc": "2.0", "id": 7, "method": "ping"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 7);
        assert_eq!(body["result"], json!({}));

        send(&app, post("/api/register", server_body("a", &["quote"]))).await;
        let call = json!({
            "jsonrpc": "2.0",
            "id": "c1",
            "method": "tools/call",
            "params": {"name": "quote", "arguments": {"symbol": "SOL"}}
        });
        let (_, body) = send(&app, post("/", call.clone())).await;
        assert_eq!(body["error"]["code"], -32000);
        assert!(body["error"]["message"].as_str().unwrap().contains("No servers found"));

        node.registry().set_trust_score("a", 80.0).await;
        let (_, body) = send(&app, post("/", call)).await;
        assert!(body.get("error").is_none(), "{body}");
        assert_eq!(body["id"], "c1");

        let (_, body) = send(&app, post("/", json!({"jsonrpc": "2.0", "id": 8, "method": "resources/list"}))).await;
        assert_eq!(body["error"]["code"], -32601);
    }
}
