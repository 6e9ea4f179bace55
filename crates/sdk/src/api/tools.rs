//! Tool catalog and forwarding endpoints.

use crate::client::ToolmeshClient;
use crate::error::ToolmeshResult;
use serde::{Deserialize, Serialize};
use toolmesh_core::types::{RoutedCallRequest, SearchOptions, ToolCallResult, ToolSearchResult};

/// Tools API: catalog search and forwarded calls.
pub struct ToolsApi<'a> {
    client: &'a ToolmeshClient,
}

impl<'a> ToolsApi<'a> {
    pub(crate) fn new(client: &'a ToolmeshClient) -> Self {
        Self { client }
    }

    /// Ranked catalog search.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> ToolmeshResult<Vec<ToolSearchResult>> {
        let mut params: Vec<(&str, String)> = vec![("q", query.to_string())];
        if let Some(category) = &options.category {
            params.push(("category", category.clone()));
        }
        if let Some(limit) = options.limit {
            params.push(("limit", limit.to_string()));
        }

        let response: SearchToolsResponse =
            self.client.http.get_with_query("/api/tools/search", &params).await?;
        Ok(response.results)
    }

    /// Call `tool` on a specific server. Policy refusals come back as
    /// `success: false`, not as errors.
    pub async fn call(
        &self,
        server_id: &str,
        tool: &str,
        params: serde_json::Value,
    ) -> ToolmeshResult<ToolCallResult> {
        let request = RoutedCallRequest {
            server_id: Some(server_id.to_string()),
            tool: tool.to_string(),
            params,
        };
        self.client.http.post("/api/call", &request).await
    }

    /// Call `tool` on whichever server the node trusts most.
    pub async fn call_auto(&self, tool: &str, params: serde_json::Value) -> ToolmeshResult<ToolCallResult> {
        let request = RoutedCallRequest {
            server_id: None,
            tool: tool.to_string(),
            params,
        };
        self.client.http.post("/api/call", &request).await
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchToolsResponse {
    pub results: Vec<ToolSearchResult>,
    pub count: usize,
}
