use super::{ServerStore, StoredServer};
use crate::types::AbuseReport;
use anyhow::{Context, Result};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::PathBuf;
use std::sync::Arc;

const SERVERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("servers");
const REPORTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("abuse_reports");

/// Embedded on-disk store using redb, JSON-encoded values
#[derive(Clone)]
pub struct RedbServerStore {
    db: Arc<Database>,
}

impl RedbServerStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create store directory")?;
        }

        let db = Database::create(&path).context("Failed to create redb database")?;

        let write_txn = db.begin_write().context("Failed to begin write transaction")?;
        {
            let _servers_table = write_txn
                .open_table(SERVERS_TABLE)
                .context("Failed to open servers table")?;
            let _reports_table = write_txn
                .open_table(REPORTS_TABLE)
                .context("Failed to open reports table")?;
        }
        write_txn.commit().context("Failed to commit transaction")?;

        Ok(Self { db: Arc::new(db) })
    }

    fn put_value(
        &self,
        table_def: TableDefinition<&str, &[u8]>,
        key: &str,
        value: &[u8],
    ) -> Result<()> {
        let write_txn = self.db.begin_write().context("Failed to begin write")?;
        {
            let mut table = write_txn
                .open_table(table_def)
                .context("Failed to open table")?;
            table.insert(key, value).context("Failed to insert value")?;
        }
        write_txn.commit().context("Failed to commit")?;
        Ok(())
    }

    fn list_values<T: serde::de::DeserializeOwned>(
        &self,
        table_def: TableDefinition<&str, &[u8]>,
    ) -> Result<Vec<T>> {
        let read_txn = self.db.begin_read().context("Failed to begin read")?;
        let table = read_txn.open_table(table_def).context("Failed to open table")?;

        let mut values = Vec::new();
        for item in table.iter().context("Failed to iterate table")? {
            let (_key, value) = item.context("Failed to read item")?;
            values.push(serde_json::from_slice(value.value()).context("Failed to deserialize value")?);
        }
        Ok(values)
    }
}

impl ServerStore for RedbServerStore {
    fn put_server(&self, stored: &StoredServer) -> Result<()> {
        let value = serde_json::to_vec(stored).context("Failed to serialize server")?;
        self.put_value(SERVERS_TABLE, &stored.server.id, &value)
    }

    fn get_server(&self, id: &str) -> Result<Option<StoredServer>> {
        let read_txn = self.db.begin_read().context("Failed to begin read")?;
        let table = read_txn
            .open_table(SERVERS_TABLE)
            .context("Failed to open table")?;

        match table.get(id).context("Failed to get server")? {
            Some(guard) => {
                let stored = serde_json::from_slice(guard.value())
                    .context("Failed to deserialize server")?;
                Ok(Some(stored))
            }
            None => Ok(None),
        }
    }

    fn delete_server(&self, id: &str) -> Result<()> {
        let write_txn = self.db.begin_write().context("Failed to begin write")?;
        {
            let mut table = write_txn
                .open_table(SERVERS_TABLE)
                .context("Failed to open table")?;
            table.remove(id).context("Failed to delete server")?;
        }
        write_txn.commit().context("Failed to commit")?;
        Ok(())
    }

    fn list_servers(&self) -> Result<Vec<StoredServer>> {
        self.list_values(SERVERS_TABLE)
    }

    fn append_report(&self, report: &AbuseReport) -> Result<()> {
        let value = serde_json::to_vec(report).context("Failed to serialize report")?;
        self.put_value(REPORTS_TABLE, &report.id, &value)
    }

    fn list_reports(&self) -> Result<Vec<AbuseReport>> {
        let mut reports: Vec<AbuseReport> = self.list_values(REPORTS_TABLE)?;
        reports.sort_by(|a, b| a.reported_at.cmp(&b.reported_at));
        Ok(reports)
    }
}
