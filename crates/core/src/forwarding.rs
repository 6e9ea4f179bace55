// Policy-gated forwarding of tool calls to remote servers

use crate::error::{FederationError, FederationResult};
use crate::registry::ServerRegistry;
use crate::storage::StoredServer;
use crate::transport::bounded;
use crate::types::{FederatedServer, ToolCallRequest, ToolCallResult};
use chrono::Utc;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Executes tool calls against remote servers.
///
/// Every policy failure (unknown server, low trust, unknown tool, transport
/// failure) comes back as a `ToolCallResult` with `success: false`; nothing
/// is raised across this boundary.
pub struct ForwardingGateway {
    registry: Arc<ServerRegistry>,
}

impl ForwardingGateway {
    pub fn new(registry: Arc<ServerRegistry>) -> Self {
        Self { registry }
    }

    /// Call `request.tool` on the named server
    pub async fn call_tool(&self, request: ToolCallRequest) -> ToolCallResult {
        let server = match self.authorize(&request.server_id, &request.tool).await {
            Ok(server) => server,
            Err(e) => {
                tracing::info!(
                    "Refused call to {} on {}: {}",
                    request.tool,
                    request.server_id,
                    e
                );
                return ToolCallResult::failure(e.to_string()).with_server(request.server_id);
            }
        };

        self.forward(&server, &request.tool, &request.params).await
    }

    /// Route to the most trusted qualifying server, preferring lower latency on ties
    pub async fn call_tool_auto(&self, tool: &str, params: serde_json::Value) -> ToolCallResult {
        match self.select_server(tool).await {
            Ok(server) => {
                tracing::debug!("Auto-routing {} to {}", tool, server.id);
                self.call_tool(ToolCallRequest {
                    server_id: server.id,
                    tool: tool.to_string(),
                    params,
                })
                .await
            }
            Err(e) => ToolCallResult::failure(e.to_string()),
        }
    }

    /// Best server exposing `tool` at or above the forwarding threshold
    pub async fn select_server(&self, tool: &str) -> FederationResult<FederatedServer> {
        let min_trust = self.registry.config().min_trust_score;
        let candidates = self.registry.snapshot().await;

        candidates
            .into_iter()
            .filter(|s| s.server.has_tool(tool) && s.server.trust_score >= min_trust)
            .fold(None::<StoredServer>, |best, candidate| match best {
                Some(best) if compare_candidates(&candidate, &best) != Ordering::Greater => {
                    Some(best)
                }
                _ => Some(candidate),
            })
            .map(|s| s.server)
            .ok_or_else(|| FederationError::NoServersFound(tool.to_string()))
    }

    async fn authorize(&self, server_id: &str, tool: &str) -> FederationResult<FederatedServer> {
        let server = self
            .registry
            .get_server(server_id)
            .await
            .ok_or_else(|| FederationError::ServerNotFound(server_id.to_string()))?;

        let required = self.registry.config().min_trust_score;
        if server.trust_score < required {
            return Err(FederationError::TrustTooLow {
                server_id: server_id.to_string(),
                trust: server.trust_score,
                required,
            });
        }

        if !server.has_tool(tool) {
            return Err(FederationError::ToolNotFound {
                server_id: server_id.to_string(),
                tool: tool.to_string(),
            });
        }
        Ok(server)
    }

    async fn forward(
        &self,
        server: &FederatedServer,
        tool: &str,
        params: &serde_json::Value,
    ) -> ToolCallResult {
        let config = self.registry.config();
        let alpha = config.metrics_smoothing;

        let started = Instant::now();
        let outcome = bounded(
            config.request_timeout(),
            self.registry
                .transport()
                .call_tool(&server.endpoint, tool, params),
        )
        .await;
        let elapsed = started.elapsed();
        let latency_ms = elapsed.as_secs_f64() * 1000.0;
        let succeeded = outcome.is_ok();

        self.registry
            .update_metrics(&server.id, |stored| {
                let metrics = &mut stored.metrics;
                metrics.total_requests += 1;
                if succeeded {
                    metrics.avg_response_time_ms = if metrics.avg_response_time_ms == 0.0 {
                        latency_ms
                    } else {
                        (1.0 - alpha) * metrics.avg_response_time_ms + alpha * latency_ms
                    };
                    let now = Utc::now();
                    if now > stored.server.last_seen_at {
                        stored.server.last_seen_at = now;
                    }
                } else {
                    metrics.total_errors += 1;
                }
                let successes = metrics.total_requests.saturating_sub(metrics.total_errors);
                metrics.success_rate = successes as f64 / metrics.total_requests as f64 * 100.0;
            })
            .await;

        match outcome {
            Ok(result) => {
                tracing::debug!("Forwarded {} to {} in {:?}", tool, server.id, elapsed);
                ToolCallResult::ok(&server.id, result, elapsed.as_millis() as u64)
            }
            Err(e) => {
                tracing::warn!("Forwarding {} to {} failed: {}", tool, server.id, e);
                let mut result = ToolCallResult::failure(e.to_string()).with_server(&server.id);
                result.duration_ms = Some(elapsed.as_millis() as u64);
                result
            }
        }
    }
}

/// Higher trust wins; equal trust prefers the lower average response time
fn compare_candidates(a: &StoredServer, b: &StoredServer) -> Ordering {
    a.server
        .trust_score
        .total_cmp(&b.server.trust_score)
        .then_with(|| {
            b.metrics
                .avg_response_time_ms
                .total_cmp(&a.metrics.avg_response_time_ms)
        })
}
