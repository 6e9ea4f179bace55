// Periodic liveness probing feeding uptime/latency into trust

use crate::registry::ServerRegistry;
use crate::transport::bounded;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Result of probing one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub server_id: String,
    pub reachable: bool,
    pub latency_ms: Option<f64>,
    pub trust_score: f64,
    pub consecutive_failures: u32,
    pub removed: bool,
}

/// Summary of one health round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub checked: usize,
    pub reachable: usize,
    pub unreachable: usize,
    pub removed: Vec<String>,
}

/// Probes every known server and folds the outcome into its metrics.
///
/// A single miss only lowers uptime; removal happens after
/// `max_consecutive_failures` misses in a row.
pub struct HealthMonitor {
    registry: Arc<ServerRegistry>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ServerRegistry>) -> Self {
        Self { registry }
    }

    /// Probe one server and record the outcome; `None` if it is unknown
    pub async fn check_server(&self, server_id: &str) -> Option<ProbeOutcome> {
        let server = self.registry.get_server(server_id).await?;
        let config = self.registry.config();
        let alpha = config.metrics_smoothing;

        let started = Instant::now();
        let probe = bounded(
            config.request_timeout(),
            self.registry.transport().ping(&server.endpoint),
        )
        .await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        if let Err(e) = &probe {
            tracing::warn!("Health probe failed for {} ({}): {}", server_id, server.endpoint, e);
        }
        let reachable = probe.is_ok();

        let (consecutive_failures, trust_score) = self
            .registry
            .update_metrics(server_id, |stored| {
                let metrics = &mut stored.metrics;
                let sample = if reachable { 100.0 } else { 0.0 };
                metrics.uptime = ema(metrics.uptime, sample, alpha);

                if reachable {
                    metrics.avg_response_time_ms = if metrics.avg_response_time_ms == 0.0 {
                        latency_ms
                    } else {
                        ema(metrics.avg_response_time_ms, latency_ms, alpha)
                    };
                    metrics.successful_probes = metrics.successful_probes.saturating_add(1);
                    stored.consecutive_failures = 0;
                    let now = Utc::now();
                    if now > stored.server.last_seen_at {
                        stored.server.last_seen_at = now;
                    }
                } else {
                    stored.consecutive_failures = stored.consecutive_failures.saturating_add(1);
                }
                stored.consecutive_failures
            })
            .await?;

        let max_failures = config.max_consecutive_failures;
        let removed = max_failures > 0
            && consecutive_failures >= max_failures
            && self
                .registry
                .remove_server(
                    server_id,
                    &format!("unresponsive after {} consecutive health checks", consecutive_failures),
                )
                .await;

        tracing::debug!(
            server_id,
            reachable,
            latency_ms,
            trust_score,
            consecutive_failures,
            "Health probe recorded"
        );

        Some(ProbeOutcome {
            server_id: server_id.to_string(),
            reachable,
            latency_ms: reachable.then_some(latency_ms),
            trust_score,
            consecutive_failures,
            removed,
        })
    }

    /// Probe every known server concurrently, each bounded by the request timeout
    pub async fn check_all(self: &Arc<Self>) -> HealthReport {
        let ids: Vec<String> = self
            .registry
            .snapshot()
            .await
            .into_iter()
            .map(|s| s.server.id)
            .collect();

        let mut probes = JoinSet::new();
        for id in ids {
            let monitor = self.clone();
            probes.spawn(async move { monitor.check_server(&id).await });
        }

        let mut report = HealthReport::default();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(Some(outcome)) => {
                    report.checked += 1;
                    if outcome.reachable {
                        report.reachable += 1;
                    } else {
                        report.unreachable += 1;
                    }
                    if outcome.removed {
                        report.removed.push(outcome.server_id);
                    }
                }
                // removed concurrently
                Ok(None) => {}
                Err(e) => tracing::error!("Health probe task failed: {}", e),
            }
        }
        report
    }

    /// Run rounds every `interval` until cancelled
    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        tracing::info!("Health monitor started (interval {:?})", interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let report = self.check_all().await;
            tracing::info!(
                "Health round: {} checked, {} reachable, {} unreachable, {} removed",
                report.checked,
                report.reachable,
                report.unreachable,
                report.removed.len()
            );
        }
        tracing::info!("Health monitor stopped");
    }
}

fn ema(current: f64, sample: f64, alpha: f64) -> f64 {
    (1.0 - alpha) * current + alpha * sample
}
