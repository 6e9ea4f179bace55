// Authoritative local store of known federated servers

use crate::catalog::ToolCatalogIndex;
use crate::config::FederationConfig;
use crate::error::{FederationError, FederationResult};
use crate::events::{EventBus, FederationEventType};
use crate::storage::{ServerStore, StoredServer};
use crate::transport::{bounded, PeerTransport};
use crate::trust::{clamp_trust, TrustCalculator};
use crate::types::{FederatedServer, RegistrationResult, ServerFilter, TrustMetrics};
use anyhow::Context;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// How a record mutation treats the trust score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrustRule {
    Keep,
    Recompute,
    /// Recompute, but never end above the previous score
    RecomputeCapped,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<String, StoredServer>,
    next_sequence: u64,
}

/// Local view of the federation.
///
/// A single coarse lock guards every record; trust is always recomputed from
/// the metrics read under that same lock, so concurrent metric updates cannot
/// lose each other's writes.
pub struct ServerRegistry {
    config: Arc<FederationConfig>,
    state: RwLock<RegistryState>,
    catalog: Arc<ToolCatalogIndex>,
    store: Arc<dyn ServerStore>,
    transport: Arc<dyn PeerTransport>,
    events: EventBus,
}

impl ServerRegistry {
    pub fn new(
        config: Arc<FederationConfig>,
        store: Arc<dyn ServerStore>,
        transport: Arc<dyn PeerTransport>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            state: RwLock::new(RegistryState::default()),
            catalog: Arc::new(ToolCatalogIndex::new()),
            store,
            transport,
            events,
        }
    }

    pub fn catalog(&self) -> Arc<ToolCatalogIndex> {
        self.catalog.clone()
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn transport(&self) -> Arc<dyn PeerTransport> {
        self.transport.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Load persisted records, returning how many were restored
    pub async fn restore(&self) -> anyhow::Result<usize> {
        let stored = self
            .store
            .list_servers()
            .context("Failed to load servers from store")?;

        let mut state = self.state.write().await;
        state.next_sequence = stored.iter().map(|s| s.sequence + 1).max().unwrap_or(0);
        state.entries = stored
            .into_iter()
            .map(|s| (s.server.id.clone(), s))
            .collect();
        self.reindex(&state);

        tracing::info!("Restored {} servers from store", state.entries.len());
        Ok(state.entries.len())
    }

    /// Check a candidate record without admitting it
    pub fn validate(server: &FederatedServer) -> FederationResult<()> {
        if server.id.trim().is_empty() {
            return Err(FederationError::InvalidServer("id must not be empty".into()));
        }
        if server.endpoint.trim().is_empty() {
            return Err(FederationError::InvalidServer("endpoint must not be empty".into()));
        }
        if server.owner.trim().is_empty() {
            return Err(FederationError::InvalidServer("owner must not be empty".into()));
        }
        if server.tools.is_empty() {
            return Err(FederationError::InvalidServer(
                "server must expose at least one tool".into(),
            ));
        }

        let mut names = HashSet::new();
        for tool in &server.tools {
            if tool.name.trim().is_empty() {
                return Err(FederationError::InvalidServer("tool name must not be empty".into()));
            }
            if !names.insert(tool.name.as_str()) {
                return Err(FederationError::InvalidServer(format!(
                    "duplicate tool name: {}",
                    tool.name
                )));
            }
        }
        Ok(())
    }

    /// Validate, probe and admit a new server at the configured starting trust.
    ///
    /// Either the record is fully admitted (stored, indexed, announced) or
    /// nothing changes.
    pub async fn register_server(
        &self,
        mut server: FederatedServer,
    ) -> FederationResult<RegistrationResult> {
        Self::validate(&server)?;

        if self.state.read().await.entries.contains_key(&server.id) {
            return Err(FederationError::AlreadyRegistered(server.id));
        }

        bounded(
            self.config.request_timeout(),
            self.transport.ping(&server.endpoint),
        )
        .await
        .map_err(|e| FederationError::Unreachable {
            endpoint: server.endpoint.clone(),
            reason: e.to_string(),
        })?;

        let now = Utc::now();
        server.trust_score = self.config.new_server_trust;
        server.registered_at = now;
        server.last_seen_at = now;

        let server_id = server.id.clone();
        self.admit(server).await?;

        tracing::info!("Registered server {}", server_id);
        self.events.publish(FederationEventType::ServerRegistered {
            server_id: server_id.clone(),
        });

        Ok(RegistrationResult {
            success: true,
            server_id,
        })
    }

    /// Admit a server already probed by the caller (gossip adoption).
    /// The claimed trust score is discarded.
    pub(crate) async fn adopt(
        &self,
        mut server: FederatedServer,
        via_peer: Option<String>,
    ) -> FederationResult<()> {
        Self::validate(&server)?;
        let now = Utc::now();
        server.trust_score = self.config.new_server_trust;
        server.registered_at = now;
        server.last_seen_at = now;

        let server_id = server.id.clone();
        self.admit(server).await?;

        tracing::info!("Adopted server {} from gossip", server_id);
        self.events
            .publish(FederationEventType::ServerAdopted { server_id, via_peer });
        Ok(())
    }

    async fn admit(&self, server: FederatedServer) -> FederationResult<()> {
        let mut state = self.state.write().await;
        if state.entries.contains_key(&server.id) {
            return Err(FederationError::AlreadyRegistered(server.id));
        }

        let stored = StoredServer {
            server,
            metrics: TrustMetrics::default(),
            sequence: state.next_sequence,
            consecutive_failures: 0,
        };
        self.store.put_server(&stored)?;

        state.next_sequence += 1;
        state.entries.insert(stored.server.id.clone(), stored);
        self.reindex(&state);
        Ok(())
    }

    pub async fn get_server(&self, id: &str) -> Option<FederatedServer> {
        self.state
            .read()
            .await
            .entries
            .get(id)
            .map(|s| s.server.clone())
    }

    pub async fn get_trust_metrics(&self, id: &str) -> Option<TrustMetrics> {
        self.state
            .read()
            .await
            .entries
            .get(id)
            .map(|s| s.metrics.clone())
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.state.read().await.entries.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Servers matching `filter`, highest trust first, ties in insertion order
    pub async fn list_servers(&self, filter: &ServerFilter) -> Vec<FederatedServer> {
        let state = self.state.read().await;
        let mut matches: Vec<&StoredServer> = state
            .entries
            .values()
            .filter(|s| matches_filter(&s.server, filter))
            .collect();

        matches.sort_by(|a, b| {
            b.server
                .trust_score
                .total_cmp(&a.server.trust_score)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });

        matches
            .into_iter()
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|s| s.server.clone())
            .collect()
    }

    /// Consistent copy of every record in insertion order
    pub async fn snapshot(&self) -> Vec<StoredServer> {
        let state = self.state.read().await;
        let mut records: Vec<StoredServer> = state.entries.values().cloned().collect();
        records.sort_by_key(|s| s.sequence);
        records
    }

    /// Endpoints of every known server
    pub async fn known_endpoints(&self) -> Vec<String> {
        self.snapshot()
            .await
            .into_iter()
            .map(|s| s.server.endpoint)
            .collect()
    }

    pub async fn remove_server(&self, id: &str, reason: &str) -> bool {
        let mut state = self.state.write().await;
        if state.entries.remove(id).is_none() {
            return false;
        }
        if let Err(e) = self.store.delete_server(id) {
            tracing::warn!("Failed to delete server {} from store: {:#}", id, e);
        }
        self.reindex(&state);
        drop(state);

        tracing::info!("Removed server {}: {}", id, reason);
        self.events.publish(FederationEventType::ServerRemoved {
            server_id: id.to_string(),
            reason: reason.to_string(),
        });
        true
    }

    /// Record a successful contact. `lastSeenAt` never moves backwards.
    pub async fn touch(&self, id: &str) -> bool {
        self.update_record(id, TrustRule::Keep, |stored| {
            let now = Utc::now();
            if now > stored.server.last_seen_at {
                stored.server.last_seen_at = now;
            }
        })
        .await
        .is_some()
    }

    /// Administrative trust override, clamped to [0, 100]. The next metric
    /// update recomputes trust from metrics again.
    pub async fn set_trust_score(&self, id: &str, score: f64) -> Option<f64> {
        self.update_record(id, TrustRule::Keep, |stored| {
            stored.server.trust_score = clamp_trust(score);
        })
        .await
        .map(|(_, trust)| trust)
    }

    /// Mutate a server's metrics and recompute its trust under one lock.
    /// Returns the closure's output and the resulting trust score.
    pub async fn update_metrics<F, R>(&self, id: &str, f: F) -> Option<(R, f64)>
    where
        F: FnOnce(&mut StoredServer) -> R,
    {
        self.update_record(id, TrustRule::Recompute, f).await
    }

    /// Like [`update_metrics`](Self::update_metrics), but the recomputed
    /// score never ends above the current one. Used for penalties.
    pub async fn penalize<F, R>(&self, id: &str, f: F) -> Option<(R, f64)>
    where
        F: FnOnce(&mut StoredServer) -> R,
    {
        self.update_record(id, TrustRule::RecomputeCapped, f).await
    }

    /// Last-write-wins refresh from a remote copy of a known server.
    ///
    /// Only descriptive fields move; identity, owner, trust, registration
    /// time and metrics stay local. The remote copy must pass the same
    /// validation as a registration, and its `lastSeenAt` is capped at the
    /// local clock. Returns whether anything changed.
    pub(crate) async fn apply_remote(&self, remote: &FederatedServer) -> bool {
        if let Err(e) = Self::validate(remote) {
            tracing::debug!("Ignoring gossiped update for {}: {}", remote.id, e);
            return false;
        }
        let claimed_seen = remote.last_seen_at.min(Utc::now());

        let updated = self
            .update_record(&remote.id, TrustRule::Keep, |stored| {
                if claimed_seen <= stored.server.last_seen_at {
                    return false;
                }
                let local = &mut stored.server;
                local.name = remote.name.clone();
                local.description = remote.description.clone();
                local.endpoint = remote.endpoint.clone();
                local.protocol_version = remote.protocol_version.clone();
                local.tools = remote.tools.clone();
                local.capabilities = remote.capabilities.clone();
                local.metadata = remote.metadata.clone();
                local.last_seen_at = claimed_seen;
                true
            })
            .await
            .is_some_and(|(updated, _)| updated);

        if updated {
            self.events.publish(FederationEventType::ServerUpdated {
                server_id: remote.id.clone(),
            });
        }
        updated
    }

    async fn update_record<F, R>(&self, id: &str, rule: TrustRule, f: F) -> Option<(R, f64)>
    where
        F: FnOnce(&mut StoredServer) -> R,
    {
        let mut state = self.state.write().await;
        let stored = state.entries.get_mut(id)?;
        let previous = stored.server.trust_score;

        let out = f(stored);

        if rule != TrustRule::Keep {
            let recomputed = TrustCalculator::recompute(
                &stored.metrics,
                stored.server.last_seen_at,
                Utc::now(),
                self.config.decay_rate,
            );
            stored.server.trust_score = match rule {
                TrustRule::RecomputeCapped => recomputed.min(previous),
                _ => recomputed,
            };
        }
        let current = stored.server.trust_score;

        if let Err(e) = self.store.put_server(stored) {
            tracing::warn!("Failed to persist server {}: {:#}", id, e);
        }
        self.reindex(&state);
        drop(state);

        if (current - previous).abs() > f64::EPSILON {
            tracing::debug!("Trust for {} changed {:.2} -> {:.2}", id, previous, current);
            self.events.publish(FederationEventType::TrustChanged {
                server_id: id.to_string(),
                previous,
                current,
            });
        }
        Some((out, current))
    }

    fn reindex(&self, state: &RegistryState) {
        self.catalog.reindex(
            state
                .entries
                .values()
                .map(|stored| (&stored.server, stored.sequence)),
        );
    }
}

fn matches_filter(server: &FederatedServer, filter: &ServerFilter) -> bool {
    if let Some(min_trust) = filter.min_trust {
        if server.trust_score < min_trust {
            return false;
        }
    }
    if let Some(category) = &filter.category {
        if !server.has_category(category) {
            return false;
        }
    }
    filter.has_tools.iter().all(|tool| server.has_tool(tool))
}
