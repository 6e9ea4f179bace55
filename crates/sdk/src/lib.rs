//! # toolmesh SDK
//!
//! Rust client for a toolmesh node, plus the HTTP implementation of the
//! peer transport nodes use to reach each other.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use toolmesh_sdk::{ToolmeshClient, ToolmeshResult};
//! use toolmesh_sdk::{SearchOptions, ServerFilter};
//!
//! #[tokio::main]
//! async fn main() -> ToolmeshResult<()> {
//!     let client = ToolmeshClient::builder()
//!         .base_url("http://localhost:8080")
//!         .build()?;
//!
//!     let servers = client.servers().list(&ServerFilter::default()).await?;
//!     println!("Network knows {} servers", servers.len());
//!
//!     for hit in client.tools().search("price", &SearchOptions::default()).await? {
//!         println!("{} on {} (trust {:.1})", hit.tool.name, hit.server_id, hit.trust_score);
//!     }
//!
//!     let result = client
//!         .tools()
//!         .call_auto("get_price", serde_json::json!({"symbol": "SOL"}))
//!         .await?;
//!     println!("{:?}", result);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod transport;

pub use client::{ToolmeshClient, ToolmeshClientBuilder};
pub use config::{ClientConfig, PeerConfig, RetryConfig};
pub use error::{ToolmeshError, ToolmeshResult};
pub use transport::HttpPeerTransport;

// Re-export core types for convenience
pub use toolmesh_core::types::{
    FederatedServer, FederatedTool, GossipMessage, NetworkStats, PeerMessage, RegistrationResult,
    ReportResponse, SearchOptions, ServerFilter, ToolCallResult, ToolSearchResult, TrustMetrics,
};
pub use toolmesh_core::{FederationEvent, FederationEventType, MessageAck};
