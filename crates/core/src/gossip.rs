// Peer-to-peer propagation of server lists without a central directory

use crate::config::NodeIdentity;
use crate::registry::ServerRegistry;
use crate::transport::bounded;
use crate::types::{FederatedServer, GossipMessage};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What a merge did with each incoming entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub adopted: Vec<String>,
    pub updated: Vec<String>,
    pub ignored: Vec<String>,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        !self.adopted.is_empty() || !self.updated.is_empty()
    }

    fn absorb(&mut self, other: MergeReport) {
        self.adopted.extend(other.adopted);
        self.updated.extend(other.updated);
        self.ignored.extend(other.ignored);
    }
}

/// Summary of one outbound gossip round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GossipRoundReport {
    pub contacted: Vec<String>,
    pub failed: Vec<String>,
    pub merged: MergeReport,
}

/// Exchanges server-list summaries with a random subset of peers.
///
/// Merging is last-write-wins on `lastSeenAt` and never imports trust: an
/// unseen server is probed locally and then admitted at `newServerTrust`
/// whatever score the gossiping peer claimed. Applying the same message any
/// number of times converges to the same view.
pub struct GossipExchange {
    registry: Arc<ServerRegistry>,
    identity: NodeIdentity,
    contacted_peers: Mutex<HashSet<String>>,
}

impl GossipExchange {
    pub fn new(registry: Arc<ServerRegistry>, identity: NodeIdentity) -> Self {
        Self {
            registry,
            identity,
            contacted_peers: Mutex::new(HashSet::new()),
        }
    }

    fn peers(&self) -> MutexGuard<'_, HashSet<String>> {
        self.contacted_peers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Distinct peers successfully contacted so far
    pub fn total_peers(&self) -> usize {
        self.peers().len()
    }

    /// This node's outbound view, including itself when announcing
    pub async fn local_message(&self) -> GossipMessage {
        let mut servers: Vec<FederatedServer> = self
            .registry
            .snapshot()
            .await
            .into_iter()
            .map(|s| s.server)
            .collect();
        if self.registry.config().announce_enabled {
            servers.insert(0, self.identity.to_server());
        }
        GossipMessage { servers }
    }

    /// Merge a peer's list, then answer with ours
    pub async fn handle_incoming(&self, message: &GossipMessage) -> (MergeReport, GossipMessage) {
        let report = self.merge(message, None).await;
        (report, self.local_message().await)
    }

    /// Fold remote entries into the local view
    pub async fn merge(&self, message: &GossipMessage, via_peer: Option<&str>) -> MergeReport {
        let mut report = MergeReport::default();

        for remote in &message.servers {
            if remote.id == self.identity.id {
                report.ignored.push(remote.id.clone());
                continue;
            }

            if self.registry.contains(&remote.id).await {
                if self.registry.apply_remote(remote).await {
                    report.updated.push(remote.id.clone());
                } else {
                    report.ignored.push(remote.id.clone());
                }
                continue;
            }

            if self.adopt(remote, via_peer).await {
                report.adopted.push(remote.id.clone());
            } else {
                report.ignored.push(remote.id.clone());
            }
        }

        if report.changed() {
            tracing::debug!(
                "Gossip merge: {} adopted, {} updated, {} ignored",
                report.adopted.len(),
                report.updated.len(),
                report.ignored.len()
            );
        }
        report
    }

    async fn adopt(&self, remote: &FederatedServer, via_peer: Option<&str>) -> bool {
        let config = self.registry.config();
        if !config.discovery_enabled {
            return false;
        }
        if let Err(e) = ServerRegistry::validate(remote) {
            tracing::debug!("Ignoring gossiped server {}: {}", remote.id, e);
            return false;
        }

        let probe = bounded(
            config.request_timeout(),
            self.registry.transport().ping(&remote.endpoint),
        )
        .await;
        if let Err(e) = probe {
            tracing::debug!("Gossiped server {} failed its liveness probe: {}", remote.id, e);
            return false;
        }

        match self
            .registry
            .adopt(remote.clone(), via_peer.map(str::to_string))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Could not adopt {}: {}", remote.id, e);
                false
            }
        }
    }

    /// Random subset of known endpoints and bootstrap peers, excluding ourselves
    pub async fn select_peers(&self) -> Vec<String> {
        let config = self.registry.config();
        let mut candidates: Vec<String> = self.registry.known_endpoints().await;
        candidates.extend(config.bootstrap_peers.iter().cloned());

        let mut seen = HashSet::new();
        candidates.retain(|endpoint| {
            !endpoint.is_empty() && *endpoint != self.identity.endpoint && seen.insert(endpoint.clone())
        });

        let mut rng = rand::thread_rng();
        candidates
            .choose_multiple(&mut rng, config.gossip_fanout)
            .cloned()
            .collect()
    }

    /// Exchange views with a fresh peer selection
    pub async fn gossip_round(self: &Arc<Self>) -> GossipRoundReport {
        let config = self.registry.config();
        if !config.discovery_enabled && !config.announce_enabled {
            return GossipRoundReport::default();
        }

        let peers = self.select_peers().await;
        let message = Arc::new(self.local_message().await);
        let timeout = config.request_timeout();

        let mut exchanges = JoinSet::new();
        for peer in peers {
            let transport = self.registry.transport();
            let message = message.clone();
            exchanges.spawn(async move {
                let reply = bounded(timeout, transport.exchange_gossip(&peer, &message)).await;
                (peer, reply)
            });
        }

        let mut report = GossipRoundReport::default();
        while let Some(joined) = exchanges.join_next().await {
            let (peer, reply) = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Gossip task failed: {}", e);
                    continue;
                }
            };

            match reply {
                Ok(reply) => {
                    self.peers().insert(peer.clone());
                    self.touch_endpoint(&peer).await;
                    report.merged.absorb(self.merge(&reply, Some(&peer)).await);
                    report.contacted.push(peer);
                }
                Err(e) => {
                    tracing::warn!("Gossip with {} failed: {}", peer, e);
                    report.failed.push(peer);
                }
            }
        }
        report
    }

    async fn touch_endpoint(&self, endpoint: &str) {
        for stored in self.registry.snapshot().await {
            if stored.server.endpoint == endpoint {
                self.registry.touch(&stored.server.id).await;
            }
        }
    }

    /// Run rounds every `interval` until cancelled
    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        tracing::info!("Gossip exchange started (interval {:?})", interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let report = self.gossip_round().await;
            tracing::info!(
                "Gossip round: {} peers contacted, {} failed, {} adopted, {} updated",
                report.contacted.len(),
                report.failed.len(),
                report.merged.adopted.len(),
                report.merged.updated.len()
            );
        }
        tracing::info!("Gossip exchange stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FederationConfig;
    use crate::events::EventBus;
    use crate::storage::MemoryServerStore;
    use crate::testing::test_server;
    use crate::transport::MockTransport;
    use crate::types::ServerFilter;
    use chrono::Utc;

    fn identity() -> NodeIdentity {
        NodeIdentity {
            id: "self".to_string(),
            endpoint: "http://self.test".to_string(),
            ..Default::default()
        }
    }

    fn setup(config: FederationConfig) -> (Arc<GossipExchange>, Arc<ServerRegistry>, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        let registry = Arc::new(ServerRegistry::new(
            Arc::new(config),
            Arc::new(MemoryServerStore::new()),
            transport.clone(),
            EventBus::default(),
        ));
        let gossip = Arc::new(GossipExchange::new(registry.clone(), identity()));
        (gossip, registry, transport)
    }

    fn discovering() -> FederationConfig {
        FederationConfig {
            discovery_enabled: true,
            announce_enabled: true,
            ..FederationConfig::isolated()
        }
    }

    #[tokio::test]
    async fn test_unknown_servers_start_at_new_server_trust() {
        let (gossip, registry, _) = setup(discovering());
        let mut inflated = test_server("remote", &["get_x"]);
        inflated.trust_score = 100.0;

        let report = gossip
            .merge(&GossipMessage { servers: vec![inflated] }, Some("http://peer"))
            .await;

        assert_eq!(report.adopted, vec!["remote"]);
        assert_eq!(registry.get_server("remote").await.unwrap().trust_score, 30.0);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let (gossip, registry, _) = setup(discovering());
        let message = GossipMessage {
            servers: vec![test_server("a", &["t"]), test_server("b", &["t"])],
        };

        gossip.merge(&message, None).await;
        let first: Vec<(String, f64)> = registry
            .list_servers(&ServerFilter::default())
            .await
            .into_iter()
            .map(|s| (s.id, s.trust_score))
            .collect();

        let second_report = gossip.merge(&message, None).await;
        let second: Vec<(String, f64)> = registry
            .list_servers(&ServerFilter::default())
            .await
            .into_iter()
            .map(|s| (s.id, s.trust_score))
            .collect();

        assert!(!second_report.changed());
        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_newer_entry_wins_but_trust_stays_local() {
        let (gossip, registry, _) = setup(discovering());
        registry.register_server(test_server("a", &["old_tool"])).await.unwrap();
        registry.set_trust_score("a", 42.0).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut newer = test_server("a", &["new_tool"]);
        newer.trust_score = 99.0;
        newer.owner = "someone-else".to_string();
        newer.last_seen_at = Utc::now();

        let mut older = test_server("a", &["ancient_tool"]);
        older.last_seen_at = Utc::now() - chrono::Duration::days(1);

        let report = gossip
            .merge(&GossipMessage { servers: vec![newer.clone(), older] }, None)
            .await;
        assert_eq!(report.updated, vec!["a"]);
        assert_eq!(report.ignored, vec!["a"]);

        let local = registry.get_server("a").await.unwrap();
        assert!(local.has_tool("new_tool"));
        assert_eq!(local.trust_score, 42.0);
        assert_eq!(local.owner, "owner-a");
        assert_eq!(local.last_seen_at, newer.last_seen_at);
    }

    #[tokio::test]
    async fn test_invalid_update_to_known_server_is_ignored() {
        let (gossip, registry, _) = setup(discovering());
        registry.register_server(test_server("a", &["quote"])).await.unwrap();

        let mut broken = test_server("a", &["dup", "dup"]);
        broken.endpoint = String::new();
        broken.last_seen_at = Utc::now() + chrono::Duration::minutes(5);
        let mut empty = test_server("a", &[]);
        empty.last_seen_at = Utc::now() + chrono::Duration::minutes(5);

        let report = gossip
            .merge(&GossipMessage { servers: vec![broken, empty] }, None)
            .await;
        assert_eq!(report.ignored, vec!["a", "a"]);
        assert!(report.updated.is_empty());

        let local = registry.get_server("a").await.unwrap();
        assert_eq!(local.endpoint, "http://a.test");
        assert!(local.has_tool("quote"));
        assert!(ServerRegistry::validate(&local).is_ok());
    }

    #[tokio::test]
    async fn test_future_last_seen_is_capped_at_local_clock() {
        let (gossip, registry, _) = setup(discovering());
        registry.register_server(test_server("a", &["t"])).await.unwrap();

        let mut from_the_future = test_server("a", &["u"]);
        from_the_future.last_seen_at = Utc::now() + chrono::Duration::days(36_500);
        let report = gossip
            .merge(&GossipMessage { servers: vec![from_the_future] }, None)
            .await;
        assert_eq!(report.updated, vec!["a"]);

        let stored = registry.get_server("a").await.unwrap().last_seen_at;
        assert!(stored <= Utc::now());

        // local contact and honest peers can still move it forward
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(registry.touch("a").await);
        let touched = registry.get_server("a").await.unwrap().last_seen_at;
        assert!(touched > stored);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut honest = test_server("a", &["v"]);
        honest.last_seen_at = Utc::now();
        let report = gossip
            .merge(&GossipMessage { servers: vec![honest] }, None)
            .await;
        assert_eq!(report.updated, vec!["a"]);
        assert!(registry.get_server("a").await.unwrap().has_tool("v"));
    }

    #[tokio::test]
    async fn test_unreachable_and_invalid_entries_are_ignored() {
        let (gossip, registry, transport) = setup(discovering());
        transport.set_down("http://dead.test");

        let message = GossipMessage {
            servers: vec![
                test_server("dead", &["t"]),
                test_server("empty", &[]),
                identity().to_server(),
            ],
        };
        let report = gossip.merge(&message, None).await;

        assert!(report.adopted.is_empty());
        assert_eq!(report.ignored.len(), 3);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_discovery_disabled_ignores_unknown() {
        let (gossip, registry, _) = setup(FederationConfig::isolated());
        let report = gossip
            .merge(&GossipMessage { servers: vec![test_server("a", &["t"])] }, None)
            .await;
        assert_eq!(report.ignored, vec!["a"]);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_gossip_round_exchanges_and_counts_peers() {
        let config = FederationConfig {
            bootstrap_peers: vec!["http://seed.test".to_string(), "http://self.test".to_string()],
            ..discovering()
        };
        let (gossip, registry, transport) = setup(config);
        transport.set_gossip_reply(
            "http://seed.test",
            GossipMessage {
                servers: vec![test_server("learned", &["t"])],
            },
        );

        let report = gossip.gossip_round().await;
        assert_eq!(report.contacted, vec!["http://seed.test"]);
        assert_eq!(report.merged.adopted, vec!["learned"]);
        assert_eq!(gossip.total_peers(), 1);
        assert!(registry.contains("learned").await);

        let sent = transport.gossip_received();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.servers[0].id, "self");
    }

    #[tokio::test]
    async fn test_failed_peer_is_reported() {
        let config = FederationConfig {
            bootstrap_peers: vec!["http://gone.test".to_string()],
            ..discovering()
        };
        let (gossip, _, transport) = setup(config);
        transport.set_down("http://gone.test");

        let report = gossip.gossip_round().await;
        assert_eq!(report.failed, vec!["http://gone.test"]);
        assert_eq!(gossip.total_peers(), 0);
    }

    #[tokio::test]
    async fn test_select_peers_respects_fanout() {
        let config = FederationConfig {
            gossip_fanout: 2,
            ..discovering()
        };
        let (gossip, registry, _) = setup(config);
        for id in ["a", "b", "c", "d"] {
            registry.register_server(test_server(id, &["t"])).await.unwrap();
        }
        let peers = gossip.select_peers().await;
        assert_eq!(peers.len(), 2);
        assert_ne!(peers[0], peers[1]);
    }
}
