use crate::types::{FederatedServer, FederatedTool, ServerCapabilities, ServerMetadata};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Federation policy and scheduling knobs for one node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    pub network_id: String,
    /// Adopt previously unseen servers learned through gossip
    pub discovery_enabled: bool,
    /// Advertise this node's own description to peers
    pub announce_enabled: bool,
    pub health_check_interval_ms: u64,
    pub gossip_interval_ms: u64,
    /// Forwarding threshold
    pub min_trust_score: f64,
    /// Starting trust for newly admitted servers
    pub new_server_trust: f64,
    /// Per-day multiplicative decay applied to stale servers
    pub decay_rate: f64,
    /// Upper bound for every probe, gossip exchange and forwarded call
    pub request_timeout_ms: u64,
    /// Peers contacted per gossip round
    pub gossip_fanout: usize,
    /// Consecutive failed probes before removal; 0 never removes
    pub max_consecutive_failures: u32,
    /// EMA weight of the newest health/latency sample
    pub metrics_smoothing: f64,
    /// Endpoints contacted for gossip even when no server is known yet
    pub bootstrap_peers: Vec<String>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            network_id: "toolmesh".to_string(),
            discovery_enabled: true,
            announce_enabled: true,
            health_check_interval_ms: 60_000,
            gossip_interval_ms: 30_000,
            min_trust_score: 50.0,
            new_server_trust: 30.0,
            decay_rate: 0.99,
            request_timeout_ms: 5_000,
            gossip_fanout: 3,
            max_consecutive_failures: 5,
            metrics_smoothing: 0.2,
            bootstrap_peers: Vec::new(),
        }
    }
}

impl FederationConfig {
    /// Configuration with both background loops effectively disabled
    pub fn isolated() -> Self {
        Self {
            discovery_enabled: false,
            announce_enabled: false,
            health_check_interval_ms: u64::MAX,
            gossip_interval_ms: u64::MAX,
            ..Default::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn gossip_interval(&self) -> Duration {
        Duration::from_millis(self.gossip_interval_ms)
    }

    /// Clamp values that would break the trust model into range
    pub fn sanitized(mut self) -> Self {
        self.new_server_trust = self.new_server_trust.clamp(0.0, 100.0);
        self.min_trust_score = self.min_trust_score.clamp(0.0, 100.0);
        if !(self.decay_rate > 0.0 && self.decay_rate <= 1.0) {
            tracing::warn!(
                "decay_rate {} outside (0, 1], falling back to default",
                self.decay_rate
            );
            self.decay_rate = Self::default().decay_rate;
        }
        if !(self.metrics_smoothing > 0.0 && self.metrics_smoothing <= 1.0) {
            self.metrics_smoothing = Self::default().metrics_smoothing;
        }
        self
    }
}

/// This node's own self-description, returned by `info()` and announced in gossip
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeIdentity {
    pub id: String,
    pub name: String,
    pub description: String,
    pub endpoint: String,
    pub owner: String,
    pub tools: Vec<FederatedTool>,
    pub capabilities: ServerCapabilities,
    pub metadata: ServerMetadata,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: "toolmesh-node".to_string(),
            description: "Federated tool registry node".to_string(),
            endpoint: "http://127.0.0.1:8080".to_string(),
            owner: "anonymous".to_string(),
            tools: Vec::new(),
            capabilities: ServerCapabilities::default(),
            metadata: ServerMetadata::default(),
        }
    }
}

impl NodeIdentity {
    /// Render the identity as a server record. A node fully trusts itself;
    /// receivers ignore the claimed score anyway.
    pub fn to_server(&self) -> FederatedServer {
        let now = Utc::now();
        FederatedServer {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            endpoint: self.endpoint.clone(),
            protocol_version: crate::PROTOCOL_VERSION.to_string(),
            owner: self.owner.clone(),
            tools: self.tools.clone(),
            capabilities: self.capabilities.clone(),
            trust_score: 100.0,
            registered_at: now,
            last_seen_at: now,
            metadata: self.metadata.clone(),
        }
    }
}
