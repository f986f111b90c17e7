use model::*;
use parking_lot::Mutex;

use crate::{LapStore, LapTable, StoreError};

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryLapStore {
    table: Mutex<LapTable>,
}

impl MemoryLapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with already persisted laps.
    pub fn with_records(laps: Vec<LapRecord>) -> Self {
        Self { table: Mutex::new(LapTable::from_records(laps)) }
    }
}

#[async_trait::async_trait]
impl LapStore for MemoryLapStore {
    async fn insert(&self, lap: NewLap) -> Result<LapRecord, StoreError> {
        self.table.lock().insert(lap)
    }

    async fn personal_best(
        &self,
        driver_name: &str,
        car: &str,
        track: &str,
    ) -> Result<Option<LapRecord>, StoreError> {
        Ok(self.table.lock().personal_best(driver_name, car, track))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<LapRecord>, StoreError> {
        Ok(self.table.lock().recent(limit))
    }

    async fn best(&self, filter: &BestLapFilter, limit: usize) -> Result<Vec<LapRecord>, StoreError> {
        Ok(self.table.lock().best(filter, limit))
    }

    async fn stats(&self) -> Result<LapStats, StoreError> {
        Ok(self.table.lock().stats())
    }

    async fn delete(&self, id: u64) -> Result<bool, StoreError> {
        Ok(self.table.lock().remove(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_inserts_get_unique_ids() {
        let store = Arc::new(MemoryLapStore::new());
        let mut tasks = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.insert(NewLap::new("A", "B", "C", 90.0 + i as f64)).await.unwrap().id
            }));
        }
        let mut ids = Vec::new();
        for t in tasks {
            ids.push(t.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 32);
        assert_eq!(store.personal_best("A", "B", "C").await.unwrap().map(|l| l.lap_time), Some(90.0));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryLapStore::new();
        let lap = store.insert(NewLap::new("A", "B", "C", 90.0)).await.unwrap();
        assert!(store.delete(lap.id).await.unwrap());
        assert!(!store.delete(lap.id).await.unwrap());
        assert_eq!(store.stats().await.unwrap().total_laps, 0);
    }

    #[tokio::test]
    async fn test_invalid_lap_not_stored() {
        let store = MemoryLapStore::new();
        let err = store.insert(NewLap::new("A", "B", "C", -1.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidLap(_)));
        assert!(store.recent(10).await.unwrap().is_empty());
    }
}
