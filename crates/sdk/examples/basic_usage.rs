//! Basic SDK usage example.
//!
//! Connects to a running node, lists the servers it knows about, searches
//! the tool catalog and forwards a call to the most trusted provider.
//!
//! Run with: cargo run --example basic_usage

use std::time::Duration;
use toolmesh_sdk::{SearchOptions, ServerFilter, ToolmeshClient, ToolmeshResult};

#[tokio::main]
async fn main() -> ToolmeshResult<()> {
    tracing_subscriber::fmt::init();

    let client = ToolmeshClient::builder()
        .base_url("http://localhost:8080")
        .timeout(Duration::from_secs(10))
        .build()?;

    let health = client.health().check().await?;
    println!("Node {} on network {}: {}", health.node_id, health.network_id, health.status);

    let stats = client.network().stats().await?;
    println!(
        "{} servers, {} tools, {} peers, average trust {:.1}",
        stats.total_servers, stats.total_tools, stats.total_peers, stats.average_trust
    );

    let trusted = ServerFilter {
        min_trust: Some(50.0),
        ..Default::default()
    };
    for server in client.servers().list(&trusted).await? {
        println!("  {} ({}) trust {:.1}", server.name, server.id, server.trust_score);
    }

    let hits = client
        .tools()
        .search("price", &SearchOptions { limit: Some(5), ..Default::default() })
        .await?;
    for hit in &hits {
        println!("  {} on {} score {:.1}", hit.tool.name, hit.server_id, hit.score);
    }

    if let Some(best) = hits.first() {
        let result = client
            .tools()
            .call_auto(&best.tool.name, serde_json::json!({"symbol": "SOL"}))
            .await?;
        match result.error {
            None => println!("Result from {:?}: {:?}", result.server_id, result.result),
            Some(error) => println!("Call refused: {}", error),
        }
    }

    Ok(())
}
