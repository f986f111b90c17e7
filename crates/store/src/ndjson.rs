use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use model::*;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::io_formats::{append_ndjson, export_ndjson, import_ndjson};
use crate::{LapStore, LapTable, StoreError};

/// Append-only newline-delimited JSON file, one lap per line.
///
/// The whole file is loaded on open and kept in memory; inserts append a
/// line, deletes rewrite the file. File writes run on the blocking pool
/// while holding the table lock, so file order matches id order and a stuck
/// disk never stalls the runtime.
#[derive(Debug)]
pub struct NdjsonLapStore {
    path: PathBuf,
    table: Arc<Mutex<LapTable>>,
}

impl NdjsonLapStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source })?;
        }
        let laps = if path.exists() { import_ndjson(&path)? } else { Vec::new() };
        debug!(path = %path.display(), laps = laps.len(), "opened lap store");
        Ok(Self { path, table: Arc::new(Mutex::new(LapTable::from_records(laps))) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl LapStore for NdjsonLapStore {
    async fn insert(&self, lap: NewLap) -> Result<LapRecord, StoreError> {
        let mut table = self.table.clone().lock_owned().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let record = table.insert(lap)?;
            if let Err(err) = append_ndjson(&record, &path) {
                warn!(id = record.id, error = %err, "append failed, lap not stored");
                table.rollback(record.id);
                return Err(err);
            }
            Ok(record)
        })
        .await?
    }

    async fn personal_best(
        &self,
        driver_name: &str,
        car: &str,
        track: &str,
    ) -> Result<Option<LapRecord>, StoreError> {
        Ok(self.table.lock().await.personal_best(driver_name, car, track))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<LapRecord>, StoreError> {
        Ok(self.table.lock().await.recent(limit))
    }

    async fn best(&self, filter: &BestLapFilter, limit: usize) -> Result<Vec<LapRecord>, StoreError> {
        Ok(self.table.lock().await.best(filter, limit))
    }

    async fn stats(&self) -> Result<LapStats, StoreError> {
        Ok(self.table.lock().await.stats())
    }

    async fn delete(&self, id: u64) -> Result<bool, StoreError> {
        let mut table = self.table.clone().lock_owned().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let before = table.records().to_vec();
            if !table.remove(id) {
                return Ok(false);
            }
            if let Err(err) = export_ndjson(table.records(), &path) {
                *table = LapTable::from_records(before);
                return Err(err);
            }
            Ok(true)
        })
        .await?
    }
}
