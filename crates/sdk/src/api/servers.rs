//! Server registry endpoints.

use crate::client::ToolmeshClient;
use crate::error::ToolmeshResult;
use serde::{Deserialize, Serialize};
use toolmesh_core::types::{
    AuditRequest, AuditResponse, FederatedServer, RegistrationResult, ReportRequest, ReportResponse, ServerFilter,
    VerifyOwnerRequest, VerifyOwnerResponse,
};

/// Registry API: listing, registration, reports and owner verification.
pub struct ServersApi<'a> {
    client: &'a ToolmeshClient,
}

impl<'a> ServersApi<'a> {
    pub(crate) fn new(client: &'a ToolmeshClient) -> Self {
        Self { client }
    }

    /// List servers matching `filter`, highest trust first.
    pub async fn list(&self, filter: &ServerFilter) -> ToolmeshResult<Vec<FederatedServer>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(min_trust) = filter.min_trust {
            query.push(("minTrust", min_trust.to_string()));
        }
        if let Some(category) = &filter.category {
            query.push(("category", category.clone()));
        }
        if !filter.has_tools.is_empty() {
            query.push(("hasTools", filter.has_tools.join(",")));
        }
        if let Some(limit) = filter.limit {
            query.push(("limit", limit.to_string()));
        }

        let response: ListServersResponse =
            self.client.http.get_with_query("/api/servers", &query).await?;
        Ok(response.servers)
    }

    /// Get a specific server by id.
    pub async fn get(&self, server_id: &str) -> ToolmeshResult<FederatedServer> {
        self.client
            .http
            .get(&format!("/api/servers/{}", server_id))
            .await
    }

    /// Register a server with the node.
    pub async fn register(&self, server: &FederatedServer) -> ToolmeshResult<RegistrationResult> {
        self.client.http.post("/api/register", server).await
    }

    /// Report a server for abuse.
    pub async fn report(&self, server_id: &str, reason: &str) -> ToolmeshResult<ReportResponse> {
        let request = ReportRequest {
            server_id: server_id.to_string(),
            reason: reason.to_string(),
        };
        self.client.http.post("/api/report", &request).await
    }

    /// Submit an ownership proof; returns whether the node accepted it.
    pub async fn verify_owner(&self, server_id: &str, proof: &str) -> ToolmeshResult<bool> {
        let request = VerifyOwnerRequest {
            server_id: server_id.to_string(),
            proof: proof.to_string(),
        };
        let response: VerifyOwnerResponse = self.client.http.post("/api/verify", &request).await?;
        Ok(response.verified)
    }

    /// Record audit findings; returns the server's updated trust.
    pub async fn audit(&self, server_id: &str, audit: &AuditRequest) -> ToolmeshResult<AuditResponse> {
        self.client
            .http
            .post(&format!("/api/servers/{}/audit", server_id), audit)
            .await
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListServersResponse {
    pub servers: Vec<FederatedServer>,
    pub count: usize,
}
