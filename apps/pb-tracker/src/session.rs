use std::{sync::Arc, time::Duration};

use anyhow::Context;
use lap_ingest_core::{channel, TelemetrySource};
use lap_store::{LapStore, NdjsonLapStore};
use personal_best::LapPipeline;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Extra time given to in-flight evaluations after the listener stops.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

pub fn open_store(cfg: &AppConfig) -> anyhow::Result<NdjsonLapStore> {
    let path = cfg.store_path()?;
    NdjsonLapStore::open(&path).with_context(|| format!("could not open lap store {}", path.display()))
}

/// Listens for LMU telemetry until Ctrl-C or a transport fault.
pub async fn listen(cfg: &AppConfig) -> anyhow::Result<()> {
    let store = open_store(cfg)?;
    info!(path = %store.path().display(), "lap store ready");
    let store: Arc<dyn LapStore> = Arc::new(store);

    let source = lap_ingest_lmu::source(cfg.udp());
    let (tx, rx) = channel();
    let pipeline = tokio::spawn(LapPipeline::new(store, cfg.pipeline()).run(rx));
    info!(bind = %cfg.bind_addr, "waiting for LMU to start broadcasting");

    // dropping the listener future closes the socket and the snapshot channel
    let outcome = tokio::select! {
        res = source.run(tx) => res.context("telemetry listener failed"),
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    };

    match tokio::time::timeout(cfg.store_timeout() + DRAIN_GRACE, pipeline).await {
        Ok(Ok(stats)) => info!(
            laps = stats.laps_detected,
            saved = stats.saved,
            not_best = stats.not_best,
            store_failures = stats.store_failures,
            rejected = stats.rejected,
            "listener stopped"
        ),
        Ok(Err(err)) => warn!(error = %err, "lap pipeline task failed"),
        Err(_) => warn!("gave up waiting for lap evaluations"),
    }
    outcome
}
