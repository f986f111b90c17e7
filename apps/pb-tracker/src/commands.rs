// Lap store commands exposed on the command line
use std::{io::Write, path::Path};

use anyhow::bail;
use lap_store::{export_csv, LapStore};
use model::BestLapFilter;
use serde::Serialize;

fn print_json<T: Serialize>(out: &mut impl Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub async fn list(store: &dyn LapStore, limit: usize, out: &mut impl Write) -> anyhow::Result<()> {
    print_json(out, &store.recent(limit).await?)
}

pub async fn best(
    store: &dyn LapStore,
    filter: &BestLapFilter,
    limit: usize,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    print_json(out, &store.best(filter, limit).await?)
}

pub async fn stats(store: &dyn LapStore, out: &mut impl Write) -> anyhow::Result<()> {
    print_json(out, &store.stats().await?)
}

pub async fn delete(store: &dyn LapStore, id: u64, out: &mut impl Write) -> anyhow::Result<()> {
    if !store.delete(id).await? {
        bail!("no lap with id {id}");
    }
    writeln!(out, "lap {id} deleted")?;
    Ok(())
}

/// Writes every stored lap, oldest first.
pub async fn export(store: &dyn LapStore, dest: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let mut laps = store.recent(usize::MAX).await?;
    laps.sort_by_key(|l| l.id);
    export_csv(&laps, dest)?;
    writeln!(out, "exported {} laps to {}", laps.len(), dest.display())?;
    Ok(())
}
