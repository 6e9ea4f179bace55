// Standalone MCP gateway binary; stdout carries the protocol, logs go to stderr

use anyhow::Result;
use std::time::Duration;
use toolmesh_mcp::server::McpServer;
use toolmesh_mcp::tools::{register_federation_tools, ToolRegistry};
use toolmesh_sdk::ToolmeshClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::info!("Toolmesh MCP gateway starting...");

    let node_url = std::env::var("TOOLMESH_NODE_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
    let timeout_secs = std::env::var("TOOLMESH_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    let client = ToolmeshClient::builder()
        .base_url(&node_url)
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;

    match client.health().check().await {
        Ok(health) => tracing::info!(
            "Connected to node {} on network {}",
            health.node_id,
            health.network_id
        ),
        Err(e) => tracing::warn!("Node at {} is not reachable yet: {}", node_url, e),
    }

    let mut registry = ToolRegistry::new();
    register_federation_tools(&mut registry, client);
    tracing::info!("Registered {} tools", registry.len());

    let server = McpServer::new(registry);
    server.start().await?;

    Ok(())
}
