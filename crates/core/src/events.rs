use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A change to this node's view of the federation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: FederationEventType,
}

impl FederationEvent {
    pub fn new(event_type: FederationEventType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
        }
    }

    /// Server the event is about
    pub fn server_id(&self) -> &str {
        match &self.event_type {
            FederationEventType::ServerRegistered { server_id }
            | FederationEventType::ServerAdopted { server_id, .. }
            | FederationEventType::ServerUpdated { server_id }
            | FederationEventType::ServerRemoved { server_id, .. }
            | FederationEventType::TrustChanged { server_id, .. }
            | FederationEventType::ServerReported { server_id, .. }
            | FederationEventType::OwnerVerified { server_id } => server_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FederationEventType {
    /// Admitted through an explicit registration
    ServerRegistered { server_id: String },
    /// Admitted after being learned through gossip
    ServerAdopted { server_id: String, via_peer: Option<String> },
    /// Descriptive fields refreshed from a newer gossip entry
    ServerUpdated { server_id: String },
    ServerRemoved { server_id: String, reason: String },
    TrustChanged {
        server_id: String,
        previous: f64,
        current: f64,
    },
    ServerReported { server_id: String, reason: String },
    OwnerVerified { server_id: String },
}

/// Broadcast bus for federation events.
///
/// Every live subscriber receives every event published after it subscribed.
/// A subscriber that falls more than the channel capacity behind gets a
/// `Lagged` error and should resync from the registry.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<FederationEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event_type: FederationEventType) {
        let event = FederationEvent::new(event_type);
        tracing::debug!(server_id = event.server_id(), "federation event: {:?}", event.event_type);
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FederationEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
