// Network-wide rollup, derived on demand from the registry

use crate::gossip::GossipExchange;
use crate::registry::ServerRegistry;
use crate::types::NetworkStats;
use std::sync::Arc;

pub struct NetworkStatsAggregator {
    registry: Arc<ServerRegistry>,
    gossip: Arc<GossipExchange>,
}

impl NetworkStatsAggregator {
    pub fn new(registry: Arc<ServerRegistry>, gossip: Arc<GossipExchange>) -> Self {
        Self { registry, gossip }
    }

    pub async fn get_network_stats(&self) -> NetworkStats {
        let records = self.registry.snapshot().await;

        let total_servers = records.len();
        let total_tools = records.iter().map(|s| s.server.tools.len()).sum();
        let average_trust = if total_servers == 0 {
            0.0
        } else {
            records.iter().map(|s| s.server.trust_score).sum::<f64>() / total_servers as f64
        };

        NetworkStats {
            network_id: self.registry.config().network_id.clone(),
            total_servers,
            total_tools,
            total_peers: self.gossip.total_peers(),
            average_trust,
        }
    }
}
