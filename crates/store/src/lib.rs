//! Lap persistence: the store contract plus in-memory and NDJSON file backends.

use std::{collections::HashSet, io, path::PathBuf};

use model::*;
use time::OffsetDateTime;

mod io_formats;
mod memory;
mod ndjson;

pub use io_formats::{export_csv, export_ndjson, import_ndjson};
pub use memory::MemoryLapStore;
pub use ndjson::NdjsonLapStore;

/// Default size of the recent-laps listing.
pub const RECENT_LIMIT: usize = 100;
/// Default size of the best-laps listing.
pub const BEST_LIMIT: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("lap store I/O failed on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt lap record at {}:{line}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode lap record")]
    Encode(#[from] serde_json::Error),
    #[error("csv export failed")]
    Csv(#[from] csv::Error),
    #[error("invalid lap: {0}")]
    InvalidLap(String),
    #[error("lap store writer task failed")]
    Writer(#[from] tokio::task::JoinError),
}

/// Everything the tracker and the CRUD commands need from persistence.
///
/// Implementations must accept concurrent inserts. "Personal best" is always
/// derived from the stored laps, never kept as a flag.
#[async_trait::async_trait]
pub trait LapStore: Send + Sync {
    /// Validates and stores a lap, returning it with its assigned id.
    async fn insert(&self, lap: NewLap) -> Result<LapRecord, StoreError>;

    /// Fastest lap for an exact (driver, car, track) match.
    async fn personal_best(
        &self,
        driver_name: &str,
        car: &str,
        track: &str,
    ) -> Result<Option<LapRecord>, StoreError>;

    /// Most recently recorded laps first.
    async fn recent(&self, limit: usize) -> Result<Vec<LapRecord>, StoreError>;

    /// Fastest laps first, optionally restricted to a track and/or car.
    async fn best(&self, filter: &BestLapFilter, limit: usize) -> Result<Vec<LapRecord>, StoreError>;

    async fn stats(&self) -> Result<LapStats, StoreError>;

    /// Returns whether a lap with that id existed.
    async fn delete(&self, id: u64) -> Result<bool, StoreError>;
}

pub fn validate(lap: &NewLap) -> Result<(), StoreError> {
    for (field, value) in [("driver_name", &lap.driver_name), ("car", &lap.car), ("track", &lap.track)] {
        if value.trim().is_empty() {
            return Err(StoreError::InvalidLap(format!("missing {field}")));
        }
    }
    if !lap.lap_time.is_finite() || lap.lap_time <= 0.0 {
        return Err(StoreError::InvalidLap(format!("lap_time must be > 0, got {}", lap.lap_time)));
    }
    Ok(())
}

/// Rows plus id sequence, shared by both backends.
#[derive(Debug, Default)]
pub(crate) struct LapTable {
    laps: Vec<LapRecord>,
    next_id: u64,
}

impl LapTable {
    pub(crate) fn from_records(laps: Vec<LapRecord>) -> Self {
        let next_id = laps.iter().map(|l| l.id).max().unwrap_or(0) + 1;
        Self { laps, next_id }
    }

    pub(crate) fn records(&self) -> &[LapRecord] {
        &self.laps
    }

    pub(crate) fn insert(&mut self, lap: NewLap) -> Result<LapRecord, StoreError> {
        validate(&lap)?;
        let record = LapRecord {
            id: self.next_id.max(1),
            driver_name: lap.driver_name,
            car: lap.car,
            track: lap.track,
            lap_time: round_lap_time(lap.lap_time),
            sim: if lap.sim.trim().is_empty() { DEFAULT_SIM.to_string() } else { lap.sim },
            recorded_at: OffsetDateTime::now_utc(),
        };
        self.next_id = record.id + 1;
        self.laps.push(record.clone());
        Ok(record)
    }

    /// Drops the newest row; used when the file append behind it failed.
    pub(crate) fn rollback(&mut self, id: u64) {
        if self.laps.last().map(|l| l.id) == Some(id) {
            self.laps.pop();
        }
    }

    pub(crate) fn personal_best(&self, driver_name: &str, car: &str, track: &str) -> Option<LapRecord> {
        self.laps
            .iter()
            .filter(|l| l.is_combo(driver_name, car, track))
            .min_by(|a, b| a.lap_time.total_cmp(&b.lap_time).then(a.id.cmp(&b.id)))
            .cloned()
    }

    pub(crate) fn recent(&self, limit: usize) -> Vec<LapRecord> {
        let mut laps = self.laps.clone();
        laps.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        laps.truncate(limit);
        laps
    }

    pub(crate) fn best(&self, filter: &BestLapFilter, limit: usize) -> Vec<LapRecord> {
        let mut laps: Vec<LapRecord> = self.laps.iter().filter(|l| filter.matches(l)).cloned().collect();
        laps.sort_by(|a, b| a.lap_time.total_cmp(&b.lap_time).then(a.id.cmp(&b.id)));
        laps.truncate(limit);
        laps
    }

    pub(crate) fn stats(&self) -> LapStats {
        let tracks: HashSet<&str> = self.laps.iter().map(|l| l.track.as_str()).collect();
        let cars: HashSet<&str> = self.laps.iter().map(|l| l.car.as_str()).collect();
        LapStats {
            total_laps: self.laps.len() as u64,
            best_lap: self.best(&BestLapFilter::default(), 1).into_iter().next(),
            unique_tracks: tracks.len() as u64,
            unique_cars: cars.len() as u64,
        }
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.laps.len();
        self.laps.retain(|l| l.id != id);
        self.laps.len() != before
    }
}
