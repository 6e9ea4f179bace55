// Fixtures shared by unit tests and downstream crates' tests

use crate::types::{FederatedServer, FederatedTool, ToolSearchResult};
use std::cmp::Ordering;
use chrono::Utc;

/// A valid, unregistered server exposing `tools` (all in category "data")
pub fn test_server(id: &str, tools: &[&str]) -> FederatedServer {
    FederatedServer {
        id: id.to_string(),
        name: format!("{} server", id),
        description: format!("Test server {}", id),
        endpoint: format!("http://{}.test", id),
        protocol_version: "1.0".to_string(),
        owner: format!("owner-{}", id),
        tools: tools
            .iter()
            .map(|name| FederatedTool::new(*name, format!("Runs {}", name), "data"))
            .collect(),
        capabilities: Default::default(),
        trust_score: 0.0,
        registered_at: Utc::now(),
        last_seen_at: Utc::now(),
        metadata: Default::default(),
    }
}

/// Non-increasing by score
pub fn is_ranked(results: &[ToolSearchResult]) -> bool {
    results
        .windows(2)
        .all(|pair| pair[0].score.partial_cmp(&pair[1].score) != Some(Ordering::Less))
}
