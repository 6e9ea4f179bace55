//! Typed groups of node API endpoints.

pub mod health;
pub mod network;
pub mod servers;
pub mod tools;

pub use health::{HealthApi, HealthCheck};
pub use network::NetworkApi;
pub use servers::{ListServersResponse, ServersApi};
pub use tools::{SearchToolsResponse, ToolsApi};
