use std::sync::Arc;

use lap_ingest_core::{
    LapCompleted, LapDetector, SessionIdentity, SessionTracker, SnapshotRx, TelemetrySnapshot,
};
use lap_store::LapStore;
use model::format_lap_time;
use tokio::task::{JoinError, JoinSet};
use tracing::{info, warn};

use crate::{BestTimeEvaluator, Decision, EvaluatorConfig};

#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub evaluator: EvaluatorConfig,
    /// Forget the last lap when the lap counter drops or the track changes.
    pub detect_session_change: bool,
}

/// Tally of what a pipeline did with the laps it saw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub laps_detected: u64,
    pub saved: u64,
    pub not_best: u64,
    pub store_failures: u64,
    pub rejected: u64,
}

impl PipelineStats {
    fn record(&mut self, decision: &Decision) {
        match decision {
            Decision::Saved { .. } => self.saved += 1,
            Decision::NotBest { .. } => self.not_best += 1,
            Decision::StoreFailure(_) => self.store_failures += 1,
            Decision::Rejected { .. } => self.rejected += 1,
        }
    }
}

/// Per-listener processing: session observation and lap detection happen
/// inline for each snapshot, evaluation runs as its own task so a slow store
/// never holds up the next packet.
pub struct LapPipeline {
    tracker: SessionTracker,
    detector: LapDetector,
    evaluator: Arc<BestTimeEvaluator>,
    in_flight: JoinSet<Decision>,
    stats: PipelineStats,
}

impl LapPipeline {
    pub fn new(store: Arc<dyn LapStore>, cfg: PipelineConfig) -> Self {
        let detector = if cfg.detect_session_change {
            LapDetector::with_session_reset()
        } else {
            LapDetector::new()
        };
        Self {
            tracker: SessionTracker::new(),
            detector,
            evaluator: Arc::new(BestTimeEvaluator::new(store, cfg.evaluator)),
            in_flight: JoinSet::new(),
            stats: PipelineStats::default(),
        }
    }

    pub fn session(&self) -> &SessionIdentity {
        self.tracker.identity()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Must be called from within a tokio runtime.
    pub fn handle(&mut self, snapshot: &TelemetrySnapshot) -> Option<LapCompleted> {
        self.reap();
        self.tracker.observe(snapshot);
        let lap = self.detector.on_snapshot(snapshot)?;
        self.stats.laps_detected += 1;
        info!(
            lap = lap.lap_number(),
            time = %format_lap_time(lap.lap_time),
            session_best = %lap.best_lap_time_session.map_or_else(|| "N/A".to_string(), format_lap_time),
            "lap completed"
        );

        let evaluator = self.evaluator.clone();
        let event = lap.clone();
        self.in_flight.spawn(async move { evaluator.evaluate(&event).await });
        Some(lap)
    }

    /// Waits for every evaluation started so far.
    pub async fn drain(&mut self) -> PipelineStats {
        while let Some(joined) = self.in_flight.join_next().await {
            self.settle(joined);
        }
        self.stats
    }

    /// Processes snapshots until the channel closes, then drains.
    pub async fn run(mut self, mut rx: SnapshotRx) -> PipelineStats {
        while let Some(snapshot) = rx.recv().await {
            self.handle(&snapshot);
        }
        if !self.in_flight.is_empty() {
            info!(pending = self.in_flight.len(), "waiting for lap evaluations");
        }
        self.drain().await
    }

    fn reap(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            self.settle(joined);
        }
    }

    fn settle(&mut self, joined: Result<Decision, JoinError>) {
        match joined {
            Ok(decision) => self.stats.record(&decision),
            Err(err) => warn!(error = %err, "lap evaluation task did not finish"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lap_ingest_core::{channel, VehicleState};
    use lap_store::MemoryLapStore;
    use model::{LapRecord, DEFAULT_SIM};

    fn snapshot(last_lap_time: f64) -> TelemetrySnapshot {
        TelemetrySnapshot {
            track_name: "Bahrain International Circuit".into(),
            vehicles: vec![VehicleState {
                is_player: true,
                driver_name: "Player One".into(),
                vehicle_name: "BMW M Hybrid V8".into(),
                last_lap_time,
                best_lap_time_session: last_lap_time,
                total_laps: 1,
            }],
        }
    }

    const SEQUENCE: [f64; 7] = [-1.0, -1.0, 92.345, 92.345, 92.345, -1.0, 88.102];

    #[tokio::test]
    async fn test_sequence_on_empty_store() {
        let store = Arc::new(MemoryLapStore::new());
        let mut pipeline = LapPipeline::new(store.clone(), PipelineConfig::default());
        let mut detected = Vec::new();
        for t in SEQUENCE {
            if let Some(lap) = pipeline.handle(&snapshot(t)) {
                detected.push(lap.lap_time);
                pipeline.drain().await;
            }
        }
        assert_eq!(detected, vec![92.345, 88.102]);
        assert_eq!(
            pipeline.stats(),
            PipelineStats { laps_detected: 2, saved: 2, not_best: 0, store_failures: 0, rejected: 0 }
        );
        assert_eq!(pipeline.session().driver.as_deref(), Some("Player One"));
    }

    #[tokio::test]
    async fn test_sequence_against_existing_best() {
        let existing = LapRecord {
            id: 1,
            driver_name: "Player One".into(),
            car: "BMW M Hybrid V8".into(),
            track: "Bahrain International Circuit".into(),
            lap_time: 90.0,
            sim: DEFAULT_SIM.into(),
            recorded_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        let store = Arc::new(MemoryLapStore::with_records(vec![existing]));
        let (tx, rx) = channel();
        for t in SEQUENCE {
            tx.send(snapshot(t)).unwrap();
        }
        drop(tx);

        let stats = LapPipeline::new(store.clone(), PipelineConfig::default()).run(rx).await;
        assert_eq!(
            stats,
            PipelineStats { laps_detected: 2, saved: 1, not_best: 1, store_failures: 0, rejected: 0 }
        );
        let best = store.personal_best("Player One", "BMW M Hybrid V8", "Bahrain International Circuit").await;
        assert_eq!(best.unwrap().map(|l| l.lap_time), Some(88.102));
    }

    #[tokio::test]
    async fn test_session_reset_option() {
        let store = Arc::new(MemoryLapStore::new());
        let cfg = PipelineConfig { detect_session_change: true, ..Default::default() };
        let mut pipeline = LapPipeline::new(store, cfg);
        let mut first = snapshot(95.0);
        first.vehicles[0].total_laps = 6;
        assert!(pipeline.handle(&first).is_some());
        assert!(pipeline.handle(&snapshot(95.0)).is_some());
        let stats = pipeline.drain().await;
        assert_eq!(stats.laps_detected, 2);
    }
}
