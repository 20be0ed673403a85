use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{StorageBackend, StorageSettings};
use crate::table::ListingTable;

mod csv_dir;
mod sqlite;
pub use csv_dir::CsvDirStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub String);

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DatasetId {
    /// `scraped_data_<timestamp>`, the name saved datasets get.
    pub fn timestamped() -> Self {
        DatasetId(format!("scraped_data_{}", Local::now().format("%Y%m%d_%H%M%S")))
    }

    /// Ids double as file names, so only a conservative character set is allowed.
    pub fn validate(&self) -> Result<()> {
        let ok = !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !self.0.starts_with('.');
        if ok {
            Ok(())
        } else {
            Err(anyhow!("Invalid dataset id `{}`", self.0))
        }
    }
}

/// Where scraped tables are kept between runs.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn migrate(&self) -> Result<()> {
        Ok(())
    }
    async fn list_available(&self) -> Result<Vec<DatasetId>>;
    async fn load(&self, id: &DatasetId) -> Result<ListingTable>;
    async fn save(&self, table: &ListingTable) -> Result<DatasetId>;
}

pub async fn open_store(settings: &StorageSettings) -> Result<Box<dyn DatasetStore>> {
    let store: Box<dyn DatasetStore> = match settings.backend {
        StorageBackend::Csv => Box::new(CsvDirStore::new(&settings.data_dir)),
        StorageBackend::Sqlite => Box::new(SqliteStore::new(&settings.sqlite_path).await?),
    };
    store.migrate().await?;
    Ok(store)
}
