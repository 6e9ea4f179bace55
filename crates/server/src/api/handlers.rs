use super::ApiResult;
use crate::config::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use toolmesh_core::types::{
    AbuseReport, AuditRequest, AuditResponse, FederatedServer, GossipMessage, NetworkStats, PeerMessage, RegistrationResult,
    ReportRequest, ReportResponse, RoutedCallRequest, SearchOptions, ServerFilter, ToolCallRequest,
    ToolCallResult, ToolSearchResult, TrustMetrics, VerifyOwnerRequest, VerifyOwnerResponse,
};
use toolmesh_core::{FederationError, MessageAck};

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let node = &state.node;
    let running = node.is_running().await;
    Json(serde_json::json!({
        "status": "ok",
        "service": "toolmesh",
        "version": env!("CARGO_PKG_VERSION"),
        "networkId": node.config().network_id,
        "nodeId": node.identity().id,
        "running": running,
        "startedAt": state.started_at,
    }))
}

/// This node's own self-description
pub async fn info(State(state): State<Arc<AppState>>) -> Json<FederatedServer> {
    Json(state.node.info())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListServersQuery {
    pub min_trust: Option<f64>,
    pub category: Option<String>,
    /// Comma-separated; every listed tool must be present
    pub has_tools: Option<String>,
    pub limit: Option<usize>,
}

impl From<ListServersQuery> for ServerFilter {
    fn from(query: ListServersQuery) -> Self {
        ServerFilter {
            min_trust: query.min_trust,
            category: query.category,
            has_tools: query
                .has_tools
                .map(|tools| {
                    tools
                        .split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            limit: query.limit,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListServersResponse {
    pub servers: Vec<FederatedServer>,
    pub count: usize,
}

/// List known servers, highest trust first
pub async fn list_servers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListServersQuery>,
) -> Json<ListServersResponse> {
    let servers = state.node.servers(&query.into()).await;
    Json(ListServersResponse {
        count: servers.len(),
        servers,
    })
}

/// Get a specific server
pub async fn get_server(
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<String>,
) -> ApiResult<Json<FederatedServer>> {
    let server = state
        .node
        .server(&server_id)
        .await
        .ok_or(FederationError::ServerNotFound(server_id))?;
    Ok(Json(server))
}

/// Trust inputs behind a server's score
pub async fn get_trust_metrics(
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<String>,
) -> ApiResult<Json<TrustMetrics>> {
    let metrics = state
        .node
        .trust_metrics(&server_id)
        .await
        .ok_or(FederationError::ServerNotFound(server_id))?;
    Ok(Json(metrics))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListReportsResponse {
    pub reports: Vec<AbuseReport>,
}

/// Abuse reports filed against a server
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<String>,
) -> ApiResult<Json<ListReportsResponse>> {
    let reports = state.node.reports(&server_id)?;
    Ok(Json(ListReportsResponse { reports }))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchToolsQuery {
    #[serde(default)]
    pub q: String,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchToolsResponse {
    pub results: Vec<ToolSearchResult>,
    pub count: usize,
}

/// Ranked catalog search
pub async fn search_tools(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchToolsQuery>,
) -> Json<SearchToolsResponse> {
    let options = SearchOptions {
        category: query.category,
        limit: query.limit,
    };
    let results = state.node.search_tools(&query.q, &options);
    Json(SearchToolsResponse {
        count: results.len(),
        results,
    })
}

/// Register a server with this node
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(server): Json<FederatedServer>,
) -> ApiResult<(StatusCode, Json<RegistrationResult>)> {
    let result = state.node.register(server).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Bidirectional gossip exchange
pub async fn gossip(
    State(state): State<Arc<AppState>>,
    Json(message): Json<GossipMessage>,
) -> Json<GossipMessage> {
    Json(state.node.gossip(&message).await)
}

/// Generic peer control message
pub async fn message(
    State(state): State<Arc<AppState>>,
    Json(message): Json<PeerMessage>,
) -> Json<MessageAck> {
    Json(state.node.message(&message).await)
}

/// Report a server for abuse
pub async fn report(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReportRequest>,
) -> ApiResult<Json<ReportResponse>> {
    let outcome = state.node.report(&request.server_id, &request.reason).await?;
    Ok(Json(ReportResponse {
        reported: true,
        report_count: outcome.report_count,
        trust_score: outcome.trust_score,
    }))
}

/// Check an ownership proof
pub async fn verify_owner(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyOwnerRequest>,
) -> ApiResult<Json<VerifyOwnerResponse>> {
    let verified = state
        .node
        .verify_owner(&request.server_id, &request.proof)
        .await?;
    Ok(Json(VerifyOwnerResponse { verified }))
}

/// Record audit findings for a server
pub async fn record_audit(
    State(state): State<Arc<AppState>>,
    Path(server_id): Path<String>,
    Json(audit): Json<AuditRequest>,
) -> ApiResult<Json<AuditResponse>> {
    Ok(Json(state.node.record_audit(&server_id, &audit).await?))
}

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: serde_json::Value,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcToolCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

const RPC_METHOD_NOT_FOUND: i64 = -32601;
const RPC_INVALID_PARAMS: i64 = -32602;
const RPC_CALL_FAILED: i64 = -32000;

/// The node's own JSON-RPC endpoint, the same surface peers use to probe and
/// call federated servers. `tools/call` is routed to the best provider.
pub async fn json_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RpcRequest>,
) -> Json<serde_json::Value> {
    let outcome = match request.method.as_str() {
        "ping" => Ok(serde_json::json!({})),
        "tools/call" => match serde_json::from_value::<RpcToolCall>(request.params) {
            Ok(call) => {
                let result = state.node.call_tool_auto(&call.name, call.arguments).await;
                if result.success {
                    Ok(result.result.unwrap_or(serde_json::Value::Null))
                } else {
                    Err((
                        RPC_CALL_FAILED,
                        result.error.unwrap_or_else(|| "tool call failed".to_string()),
                    ))
                }
            }
            Err(e) => Err((RPC_INVALID_PARAMS, format!("Invalid params: {}", e))),
        },
        other => Err((RPC_METHOD_NOT_FOUND, format!("Method not found: {}", other))),
    };

    Json(match outcome {
        Ok(result) => serde_json::json!({"jsonrpc": "2.0", "id": request.id, "result": result}),
        Err((code, message)) => serde_json::json!({
            "jsonrpc": "2.0",
            "id": request.id,
            "error": {"code": code, "message": message}
        }),
    })
}

/// Forward a tool call; without `serverId` the node picks the provider
pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RoutedCallRequest>,
) -> Json<ToolCallResult> {
    let result = match request.server_id {
        Some(server_id) => {
            state
                .node
                .call_tool(ToolCallRequest {
                    server_id,
                    tool: request.tool,
                    params: request.params,
                })
                .await
        }
        None => state.node.call_tool_auto(&request.tool, request.params).await,
    };
    Json(result)
}

/// Network-wide rollup
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<NetworkStats> {
    Json(state.node.stats().await)
}
