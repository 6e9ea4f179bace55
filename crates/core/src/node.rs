// One federation node: owns the registry and every component built around it

use crate::abuse::{AbuseReporting, OwnershipVerifier, ReportOutcome};
use crate::config::{FederationConfig, NodeIdentity};
use crate::error::FederationResult;
use crate::events::{EventBus, FederationEvent};
use crate::forwarding::ForwardingGateway;
use crate::gossip::{GossipExchange, GossipRoundReport};
use crate::health::{HealthMonitor, HealthReport};
use crate::registry::ServerRegistry;
use crate::stats::NetworkStatsAggregator;
use crate::storage::ServerStore;
use crate::transport::PeerTransport;
use crate::types::{
    AbuseReport, AuditRequest, AuditResponse, FederatedServer, GossipMessage, NetworkStats, PeerMessage, PeerMessageType,
    RegistrationResult, SearchOptions, ServerFilter, ToolCallRequest, ToolCallResult,
    ToolSearchResult, TrustMetrics,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Answer to a peer control message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAck {
    pub received: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub reply_type: Option<String>,
}

struct BackgroundTasks {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// A running member of the federation.
///
/// Constructed once per process and shared behind an `Arc`; every RPC
/// operation the node answers is a method here.
pub struct FederationNode {
    identity: NodeIdentity,
    registry: Arc<ServerRegistry>,
    health: Arc<HealthMonitor>,
    gossip: Arc<GossipExchange>,
    forwarding: ForwardingGateway,
    abuse: AbuseReporting,
    stats: NetworkStatsAggregator,
    tasks: Mutex<Option<BackgroundTasks>>,
}

impl FederationNode {
    pub fn new(
        config: FederationConfig,
        identity: NodeIdentity,
        store: Arc<dyn ServerStore>,
        transport: Arc<dyn PeerTransport>,
        verifier: Arc<dyn OwnershipVerifier>,
    ) -> Self {
        let config = Arc::new(config.sanitized());
        let registry = Arc::new(ServerRegistry::new(
            config,
            store.clone(),
            transport,
            EventBus::default(),
        ));
        let gossip = Arc::new(GossipExchange::new(registry.clone(), identity.clone()));

        Self {
            health: Arc::new(HealthMonitor::new(registry.clone())),
            forwarding: ForwardingGateway::new(registry.clone()),
            abuse: AbuseReporting::new(registry.clone(), store, verifier),
            stats: NetworkStatsAggregator::new(registry.clone(), gossip.clone()),
            gossip,
            registry,
            identity,
            tasks: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &FederationConfig {
        self.registry.config()
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    /// Restore persisted state and spawn the health and gossip loops.
    /// Calling it on a running node is a no-op.
    pub async fn start(&self) -> anyhow::Result<()> {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_some() {
            return Ok(());
        }

        self.registry.restore().await?;

        let config = self.registry.config();
        let cancel = CancellationToken::new();
        let handles = vec![
            tokio::spawn(
                self.health
                    .clone()
                    .run(config.health_check_interval(), cancel.child_token()),
            ),
            tokio::spawn(
                self.gossip
                    .clone()
                    .run(config.gossip_interval(), cancel.child_token()),
            ),
        ];
        *tasks = Some(BackgroundTasks { cancel, handles });

        tracing::info!(
            "Federation node {} started on network {}",
            self.identity.id,
            config.network_id
        );
        Ok(())
    }

    /// Cancel both loops and wait for them. Rounds already in flight finish
    /// (each call inside is bounded by the request timeout).
    pub async fn stop(&self) {
        let Some(tasks) = self.tasks.lock().await.take() else {
            return;
        };
        tasks.cancel.cancel();
        for handle in tasks.handles {
            if let Err(e) = handle.await {
                tracing::error!("Background task ended abnormally: {}", e);
            }
        }
        tracing::info!("Federation node {} stopped", self.identity.id);
    }

    pub async fn is_running(&self) -> bool {
        self.tasks.lock().await.is_some()
    }

    pub fn info(&self) -> FederatedServer {
        self.identity.to_server()
    }

    pub async fn servers(&self, filter: &ServerFilter) -> Vec<FederatedServer> {
        self.registry.list_servers(filter).await
    }

    pub async fn server(&self, id: &str) -> Option<FederatedServer> {
        self.registry.get_server(id).await
    }

    pub async fn trust_metrics(&self, id: &str) -> Option<TrustMetrics> {
        self.registry.get_trust_metrics(id).await
    }

    pub fn search_tools(&self, query: &str, options: &SearchOptions) -> Vec<ToolSearchResult> {
        self.registry.catalog().search_tools(query, options)
    }

    pub async fn register(&self, server: FederatedServer) -> FederationResult<RegistrationResult> {
        self.registry.register_server(server).await
    }

    /// Merge a peer's list and answer with ours in the same round trip
    pub async fn gossip(&self, message: &GossipMessage) -> GossipMessage {
        let (_, reply) = self.gossip.handle_incoming(message).await;
        reply
    }

    pub async fn message(&self, message: &PeerMessage) -> MessageAck {
        if self.registry.touch(&message.sender_id).await {
            tracing::debug!("Peer message from known server {}", message.sender_id);
        }

        match message.message_type {
            PeerMessageType::Ping => MessageAck {
                received: true,
                reply_type: Some("pong".to_string()),
            },
            PeerMessageType::Announce | PeerMessageType::Other => MessageAck {
                received: true,
                reply_type: None,
            },
        }
    }

    pub async fn report(&self, server_id: &str, reason: &str) -> FederationResult<ReportOutcome> {
        self.abuse.report_server(server_id, reason).await
    }

    pub fn reports(&self, server_id: &str) -> FederationResult<Vec<AbuseReport>> {
        self.abuse.reports_for(server_id)
    }

    pub async fn reset_reports(&self, server_id: &str) -> FederationResult<f64> {
        self.abuse.reset_reports(server_id).await
    }

    pub async fn verify_owner(&self, server_id: &str, proof: &str) -> FederationResult<bool> {
        self.abuse.verify_owner(server_id, proof).await
    }

    pub async fn record_audit(&self, server_id: &str, audit: &AuditRequest) -> FederationResult<AuditResponse> {
        self.abuse.record_audit(server_id, audit).await
    }

    pub async fn stats(&self) -> NetworkStats {
        self.stats.get_network_stats().await
    }

    pub async fn call_tool(&self, request: ToolCallRequest) -> ToolCallResult {
        self.forwarding.call_tool(request).await
    }

    pub async fn call_tool_auto(&self, tool: &str, params: serde_json::Value) -> ToolCallResult {
        self.forwarding.call_tool_auto(tool, params).await
    }

    /// Run one health round now, outside the schedule
    pub async fn check_health(&self) -> HealthReport {
        self.health.check_all().await
    }

    /// Run one gossip round now, outside the schedule
    pub async fn gossip_round(&self) -> GossipRoundReport {
        self.gossip.gossip_round().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FederationEvent> {
        self.registry.events().subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abuse::Ed25519OwnershipVerifier;
    use crate::events::FederationEventType;
    use crate::storage::MemoryServerStore;
    use crate::testing::{is_ranked, test_server};
    use crate::transport::MockTransport;
    use serde_json::json;
    use std::time::Duration;

    fn node_with(config: FederationConfig, transport: Arc<MockTransport>) -> FederationNode {
        let identity = NodeIdentity {
            id: "self".to_string(),
            endpoint: "http://self.test".to_string(),
            ..Default::default()
        };
        FederationNode::new(
            config,
            identity,
            Arc::new(MemoryServerStore::new()),
            transport,
            Arc::new(Ed25519OwnershipVerifier),
        )
    }

    fn node() -> FederationNode {
        node_with(FederationConfig::isolated(), Arc::new(MockTransport::new()))
    }

    #[tokio::test]
    async fn test_three_trust_levels_scenario() {
        let node = node();
        for (id, trust) in [("mid", 60.0), ("top", 90.0), ("low", 30.0)] {
            node.register(test_server(id, &["get_x"])).await.unwrap();
            node.registry().set_trust_score(id, trust).await;
        }

        let order: Vec<f64> = node
            .servers(&ServerFilter::default())
            .await
            .iter()
            .map(|s| s.trust_score)
            .collect();
        assert_eq!(order, vec![90.0, 60.0, 30.0]);

        let results = node.search_tools("get", &SearchOptions::default());
        assert_eq!(results.len(), 3);
        assert!(is_ranked(&results));
        let position = |id: &str| results.iter().position(|r| r.server_id == id).unwrap();
        assert!(position("top") < position("low"));
        assert_eq!(results[0].relevance, results[2].relevance);
    }

    #[tokio::test]
    async fn test_info_describes_self() {
        let node = node();
        let info = node.info();
        assert_eq!(info.id, "self");
        assert_eq!(info.protocol_version, crate::PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_ping_message_gets_pong_and_touches_sender() {
        let node = node();
        node.register(test_server("a", &["t"])).await.unwrap();
        let before = node.server("a").await.unwrap().last_seen_at;

        tokio::time::sleep(Duration::from_millis(5)).await;
        let ack = node.message(&PeerMessage::ping("a")).await;
        assert!(ack.received);
        assert_eq!(ack.reply_type.as_deref(), Some("pong"));
        assert!(node.server("a").await.unwrap().last_seen_at > before);

        let ack = node.message(&PeerMessage::ping("stranger")).await;
        assert!(ack.received);
    }

    #[tokio::test]
    async fn test_unknown_message_type_is_acknowledged() {
        let node = node();
        let message: PeerMessage = serde_json::from_value(json!({
            "type": "subscribe",
            "senderId": "peer",
            "timestamp": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        let ack = node.message(&message).await;
        assert!(ack.received);
        assert!(ack.reply_type.is_none());
    }

    #[tokio::test]
    async fn test_gossip_twice_is_idempotent() {
        let config = FederationConfig {
            discovery_enabled: true,
            ..FederationConfig::isolated()
        };
        let node = node_with(config, Arc::new(MockTransport::new()));
        let message = GossipMessage {
            servers: vec![test_server("a", &["t"]), test_server("b", &["u"])],
        };

        node.gossip(&message).await;
        let first = node.servers(&ServerFilter::default()).await;
        node.gossip(&message).await;
        let second = node.servers(&ServerFilter::default()).await;

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert!(second.iter().all(|s| s.trust_score == 30.0));
    }

    #[tokio::test]
    async fn test_report_and_stats() {
        let node = node();
        node.register(test_server("a", &["x", "y"])).await.unwrap();
        let mut events = node.subscribe();

        let outcome = node.report("a", "spam").await.unwrap();
        assert_eq!(outcome.report_count, 1);
        assert_eq!(node.reports("a").unwrap().len(), 1);

        let stats = node.stats().await;
        assert_eq!(stats.total_servers, 1);
        assert_eq!(stats.total_tools, 2);
        assert!((stats.average_trust - outcome.trust_score).abs() < 1e-9);

        let mut saw_report = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event.event_type, FederationEventType::ServerReported { .. }) {
                saw_report = true;
            }
        }
        assert!(saw_report);
    }

    #[tokio::test]
    async fn test_call_tool_auto_through_node() {
        let transport = Arc::new(MockTransport::new());
        let node = node_with(FederationConfig::isolated(), transport.clone());
        node.register(test_server("a", &["quote"])).await.unwrap();
        node.registry().set_trust_score("a", 80.0).await;

        let result = node.call_tool_auto("quote", json!({"symbol": "SOL"})).await;
        assert!(result.success);
        assert_eq!(transport.call_count("http://a.test"), 1);
    }

    #[tokio::test]
    async fn test_healthy_verified_server_earns_forwarding() {
        use ed25519_dalek::{Signer, SigningKey};

        let transport = Arc::new(MockTransport::new());
        let node = node_with(FederationConfig::default(), transport.clone());
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let mut server = test_server("a", &["quote"]);
        server.owner = hex::encode(key.verifying_key().to_bytes());
        node.register(server).await.unwrap();

        let refused = node.call_tool_auto("quote", json!({})).await;
        assert!(!refused.success);
        assert_eq!(transport.call_count("http://a.test"), 0);

        let proof = hex::encode(key.sign(b"a").to_bytes());
        assert!(node.verify_owner("a", &proof).await.unwrap());
        for _ in 0..40 {
            node.check_health().await;
        }

        let trust = node.server("a").await.unwrap().trust_score;
        assert!(trust >= node.config().min_trust_score, "trust {trust:.2}");
        let result = node.call_tool_auto("quote", json!({"symbol": "SOL"})).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(transport.call_count("http://a.test"), 1);
    }

    #[tokio::test]
    async fn test_audit_through_node() {
        let node = node();
        node.register(test_server("a", &["t"])).await.unwrap();
        let before = node.server("a").await.unwrap().trust_score;

        let audit = AuditRequest {
            quality_score: Some(100.0),
            audited_code: Some(true),
        };
        let outcome = node.record_audit("a", &audit).await.unwrap();
        assert!(outcome.trust_score > before);
        assert!(node.trust_metrics("a").await.unwrap().audited_code);
    }

    #[tokio::test]
    async fn test_start_runs_loops_and_stop_joins_them() {
        let transport = Arc::new(MockTransport::new());
        let config = FederationConfig {
            health_check_interval_ms: 10,
            ..FederationConfig::isolated()
        };
        let node = node_with(config, transport.clone());
        node.register(test_server("a", &["t"])).await.unwrap();
        let registration_pings = transport.ping_count("http://a.test");

        node.start().await.unwrap();
        assert!(node.is_running().await);
        tokio::time::sleep(Duration::from_millis(100)).await;

        tokio::time::timeout(Duration::from_secs(2), node.stop())
            .await
            .unwrap();
        assert!(!node.is_running().await);
        assert!(transport.ping_count("http://a.test") > registration_pings);

        // restored state survives a restart
        node.start().await.unwrap();
        assert!(node.server("a").await.is_some());
        node.stop().await;
    }
}
