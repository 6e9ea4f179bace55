// MCP (Model Context Protocol) gateway into a toolmesh federation.
// Exposes federation browsing, search, forwarded calls and abuse reports
// as tools for agent clients.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;
pub use tools::{register_federation_tools, Tool, ToolRegistry};
