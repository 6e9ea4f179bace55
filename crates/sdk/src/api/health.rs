//! Health API endpoints.

use crate::client::ToolmeshClient;
use crate::error::ToolmeshResult;
use serde::{Deserialize, Serialize};

/// Health API for checking node status.
pub struct HealthApi<'a> {
    client: &'a ToolmeshClient,
}

impl<'a> HealthApi<'a> {
    pub(crate) fn new(client: &'a ToolmeshClient) -> Self {
        Self { client }
    }

    /// Check basic health status.
    pub async fn check(&self) -> ToolmeshResult<HealthCheck> {
        self.client.http.get("/api/health").await
    }
}

/// Basic health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub status: String,
    pub network_id: String,
    pub node_id: String,
    pub running: bool,
}
