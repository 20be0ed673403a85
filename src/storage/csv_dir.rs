use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::storage::{DatasetId, DatasetStore};
use crate::table::ListingTable;

/// A directory of `<id>.csv` files.
pub struct CsvDirStore {
    dir: PathBuf,
}

impl CsvDirStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, id: &DatasetId) -> Result<PathBuf> {
        id.validate()?;
        Ok(self.dir.join(format!("{}.csv", id.0)))
    }
}

#[async_trait]
impl DatasetStore for CsvDirStore {
    async fn migrate(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create data folder {}", self.dir.display()))
    }

    async fn list_available(&self) -> Result<Vec<DatasetId>> {
        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let id = DatasetId(stem.to_string());
            if id.validate().is_ok() {
                ids.push(id);
            } else {
                debug!(file = %path.display(), "Ignoring CSV with an unusable dataset name");
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn load(&self, id: &DatasetId) -> Result<ListingTable> {
        let path = self.path_for(id)?;
        let bytes = fs::read(&path)
            .await
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        ListingTable::read_csv(bytes.as_slice())
            .with_context(|| format!("Malformed CSV in {}", path.display()))
    }

    async fn save(&self, table: &ListingTable) -> Result<DatasetId> {
        self.migrate().await?;

        let base = DatasetId::timestamped();
        let mut id = base.clone();
        let mut suffix = 1;
        while fs::try_exists(self.path_for(&id)?).await.unwrap_or(false) {
            id = DatasetId(format!("{}_{}", base.0, suffix));
            suffix += 1;
        }

        let path = self.path_for(&id)?;
        let csv = table.to_csv_string().context("Failed to encode dataset")?;
        fs::write(&path, csv)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(dataset = %id, rows = table.len(), "Dataset saved");
        Ok(id)
    }
}
