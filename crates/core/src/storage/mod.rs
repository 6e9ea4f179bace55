// Persistence for the local federation view, specified against a key-value seam

pub mod memory;
pub mod redb_store;

pub use memory::MemoryServerStore;
pub use redb_store::RedbServerStore;

use crate::types::{AbuseReport, FederatedServer, TrustMetrics};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Everything the registry persists about one server, keyed by server id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredServer {
    pub server: FederatedServer,
    pub metrics: TrustMetrics,
    /// Insertion order, used to break ranking ties
    pub sequence: u64,
    #[serde(default)]
    pub consecutive_failures: u32,
}

/// Key-value store backing the server registry
pub trait ServerStore: Send + Sync {
    /// Insert or replace the record for `stored.server.id`
    fn put_server(&self, stored: &StoredServer) -> Result<()>;

    fn get_server(&self, id: &str) -> Result<Option<StoredServer>>;

    fn delete_server(&self, id: &str) -> Result<()>;

    /// All records, in no particular order
    fn list_servers(&self) -> Result<Vec<StoredServer>>;

    fn append_report(&self, report: &AbuseReport) -> Result<()>;

    fn list_reports(&self) -> Result<Vec<AbuseReport>>;
}
