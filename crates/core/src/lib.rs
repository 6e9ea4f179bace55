// Core types and functionality for the toolmesh federated tool registry

pub mod types;
pub mod error;
pub mod config;
pub mod trust;
pub mod events;
pub mod transport;
pub mod storage;
pub mod registry;
pub mod catalog;
pub mod health;
pub mod gossip;
pub mod forwarding;
pub mod abuse;
pub mod stats;
pub mod node;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

/// Protocol version advertised in this node's self-description
pub const PROTOCOL_VERSION: &str = "1.0";

pub use abuse::{Ed25519OwnershipVerifier, OwnershipVerifier, ReportOutcome};
pub use config::{FederationConfig, NodeIdentity};
pub use error::{FederationError, FederationResult, TransportError};
pub use events::{EventBus, FederationEvent, FederationEventType};
pub use node::{FederationNode, MessageAck};
pub use storage::{MemoryServerStore, RedbServerStore, ServerStore};
pub use transport::PeerTransport;
pub use trust::TrustCalculator;
pub use types::*;
