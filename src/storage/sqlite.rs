use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::storage::{DatasetId, DatasetStore};
use crate::table::ListingTable;

/// Datasets kept as CSV blobs in one SQLite file.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .context("Failed to open SQLite database")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }
}

#[async_trait]
impl DatasetStore for SqliteStore {
    async fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS datasets (
                id TEXT PRIMARY KEY,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                columns TEXT NOT NULL,
                row_count INTEGER NOT NULL,
                csv TEXT NOT NULL
            )",
            [],
        )?;

        info!("Database migration completed");
        Ok(())
    }

    async fn list_available(&self) -> Result<Vec<DatasetId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM datasets ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|id| id.map(DatasetId))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    async fn load(&self, id: &DatasetId) -> Result<ListingTable> {
        let csv: Option<String> = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT csv FROM datasets WHERE id = ?1",
                params![&id.0],
                |row| row.get(0),
            )
            .optional()?
        };

        let csv = csv.ok_or_else(|| anyhow!("Unknown dataset `{}`", id))?;
        ListingTable::read_csv(csv.as_bytes())
            .with_context(|| format!("Malformed dataset `{}`", id))
    }

    async fn save(&self, table: &ListingTable) -> Result<DatasetId> {
        let csv = table.to_csv_string().context("Failed to encode dataset")?;
        let columns = serde_json::to_string(&table.columns)?;
        let base = DatasetId::timestamped();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut id = base.clone();
        let mut suffix = 1;
        while tx
            .query_row(
                "SELECT 1 FROM datasets WHERE id = ?1",
                params![&id.0],
                |row| row.get::<_, i32>(0),
            )
            .optional()?
            .is_some()
        {
            id = DatasetId(format!("{}_{}", base.0, suffix));
            suffix += 1;
        }

        tx.execute(
            "INSERT INTO datasets (id, columns, row_count, csv) VALUES (?1, ?2, ?3, ?4)",
            params![&id.0, columns, table.len() as i64, csv],
        )?;
        tx.commit()?;

        info!(dataset = %id, rows = table.len(), "Dataset saved");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn round_trips_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("listings.db")).await.unwrap();
        store.migrate().await.unwrap();

        let table = ListingTable {
            columns: vec!["title".into(), "price".into(), "captured_at".into()],
            rows: vec![vec!["Duplex, Ngor".into(), "2 000 000".into(), "2024-05-01 09:30:00".into()]],
        };

        let first = store.save(&table).await.unwrap();
        let second = store.save(&table).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.list_available().await.unwrap(), vec![first.clone(), second]);
        assert_eq!(store.load(&first).await.unwrap(), table);
    }

    #[tokio::test]
    async fn unknown_dataset_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("listings.db")).await.unwrap();
        store.migrate().await.unwrap();

        assert!(store.load(&DatasetId("missing".into())).await.is_err());
    }
}
