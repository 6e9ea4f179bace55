use super::{ServerStore, StoredServer};
use crate::types::AbuseReport;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// Volatile store for ephemeral nodes and tests
#[derive(Default)]
pub struct MemoryServerStore {
    servers: RwLock<HashMap<String, StoredServer>>,
    reports: RwLock<Vec<AbuseReport>>,
}

impl MemoryServerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ServerStore for MemoryServerStore {
    fn put_server(&self, stored: &StoredServer) -> Result<()> {
        self.servers
            .write()
            .map_err(|_| anyhow!("server store lock poisoned"))?
            .insert(stored.server.id.clone(), stored.clone());
        Ok(())
    }

    fn get_server(&self, id: &str) -> Result<Option<StoredServer>> {
        Ok(self
            .servers
            .read()
            .map_err(|_| anyhow!("server store lock poisoned"))?
            .get(id)
            .cloned())
    }

    fn delete_server(&self, id: &str) -> Result<()> {
        self.servers
            .write()
            .map_err(|_| anyhow!("server store lock poisoned"))?
            .remove(id);
        Ok(())
    }

    fn list_servers(&self) -> Result<Vec<StoredServer>> {
        Ok(self
            .servers
            .read()
            .map_err(|_| anyhow!("server store lock poisoned"))?
            .values()
            .cloned()
            .collect())
    }

    fn append_report(&self, report: &AbuseReport) -> Result<()> {
        self.reports
            .write()
            .map_err(|_| anyhow!("report store lock poisoned"))?
            .push(report.clone());
        Ok(())
    }

    fn list_reports(&self) -> Result<Vec<AbuseReport>> {
        Ok(self
            .reports
            .read()
            .map_err(|_| anyhow!("report store lock poisoned"))?
            .clone())
    }
}
