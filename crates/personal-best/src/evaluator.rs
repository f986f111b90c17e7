use std::{future::Future, sync::Arc, time::Duration};

use lap_ingest_core::LapCompleted;
use lap_store::{LapStore, StoreError};
use model::*;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreFailure {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("lap store did not answer within {0:?}")]
    Timeout(Duration),
}

/// Outcome of checking one completed lap against the stored personal best.
#[derive(Debug)]
pub enum Decision {
    /// Lap stored; `previous_best` is `None` for the first lap of a combo.
    Saved { record: LapRecord, previous_best: Option<f64> },
    /// Tied or slower, nothing written.
    NotBest { current_best: f64 },
    /// The store failed or timed out. The lap is dropped, there is no retry.
    StoreFailure(StoreFailure),
    /// Lap time rounds to zero milliseconds; never stored.
    Rejected { lap_time: f64 },
}

impl Decision {
    pub fn is_saved(&self) -> bool {
        matches!(self, Decision::Saved { .. })
    }
}

#[derive(Clone, Debug)]
pub struct EvaluatorConfig {
    /// Tag written with every saved lap.
    pub sim: String,
    /// Upper bound for each store call.
    pub store_timeout: Duration,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self { sim: DEFAULT_SIM.into(), store_timeout: Duration::from_secs(5) }
    }
}

pub struct BestTimeEvaluator {
    store: Arc<dyn LapStore>,
    cfg: EvaluatorConfig,
}

impl BestTimeEvaluator {
    pub fn new(store: Arc<dyn LapStore>, cfg: EvaluatorConfig) -> Self {
        Self { store, cfg }
    }

    /// Saves the lap if it is the first for its (driver, car, track) or
    /// strictly faster than the stored best. Never fails: store problems
    /// come back as [`Decision::StoreFailure`].
    pub async fn evaluate(&self, lap: &LapCompleted) -> Decision {
        match self.try_evaluate(lap).await {
            Ok(decision) => decision,
            Err(err) => {
                error!(driver = %lap.driver_name, car = %lap.car, track = %lap.track, error = %err, "could not check personal best");
                Decision::StoreFailure(err)
            }
        }
    }

    async fn try_evaluate(&self, lap: &LapCompleted) -> Result<Decision, StoreFailure> {
        // compare at stored precision so an equal-once-stored lap is a tie
        let lap_time = round_lap_time(lap.lap_time);
        if lap_time <= 0.0 {
            warn!(lap_time = lap.lap_time, "lap time below one millisecond, ignored");
            return Ok(Decision::Rejected { lap_time: lap.lap_time });
        }

        let current = self
            .bounded(self.store.personal_best(&lap.driver_name, &lap.car, &lap.track))
            .await?;

        if let Some(best) = &current {
            if lap_time >= best.lap_time {
                info!(
                    current_pb = %format_lap_time(best.lap_time),
                    off_by = %format!("+{:.3}s", lap_time - best.lap_time),
                    "not a personal best"
                );
                return Ok(Decision::NotBest { current_best: best.lap_time });
            }
        }

        let new_lap = NewLap::new(&lap.driver_name, &lap.car, &lap.track, lap_time).with_sim(&self.cfg.sim);
        let record = self.bounded(self.store.insert(new_lap)).await?;
        match &current {
            None => info!(id = record.id, "first lap on this track/car combo, saved"),
            Some(best) => info!(
                id = record.id,
                previous = %format_lap_time(best.lap_time),
                improved_by = %format!("{:.3}s", best.lap_time - record.lap_time),
                "new personal best, saved"
            ),
        }
        Ok(Decision::Saved { record, previous_best: current.map(|b| b.lap_time) })
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreFailure> {
        tokio::time::timeout(self.cfg.store_timeout, call)
            .await
            .map_err(|_| StoreFailure::Timeout(self.cfg.store_timeout))?
            .map_err(StoreFailure::from)
    }
}
