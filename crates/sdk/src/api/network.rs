//! Node identity, stats and peer endpoints.

use crate::client::ToolmeshClient;
use crate::error::ToolmeshResult;
use toolmesh_core::types::{FederatedServer, GossipMessage, NetworkStats, PeerMessage};
use toolmesh_core::MessageAck;

pub struct NetworkApi<'a> {
    client: &'a ToolmeshClient,
}

impl<'a> NetworkApi<'a> {
    pub(crate) fn new(client: &'a ToolmeshClient) -> Self {
        Self { client }
    }

    /// The node's own self-description.
    pub async fn info(&self) -> ToolmeshResult<FederatedServer> {
        self.client.http.get("/api/info").await
    }

    pub async fn stats(&self) -> ToolmeshResult<NetworkStats> {
        self.client.http.get("/api/stats").await
    }

    /// Send our view, receive the node's.
    pub async fn gossip(&self, message: &GossipMessage) -> ToolmeshResult<GossipMessage> {
        self.client.http.post("/api/gossip", message).await
    }

    pub async fn message(&self, message: &PeerMessage) -> ToolmeshResult<MessageAck> {
        self.client.http.post("/api/message", message).await
    }
}
