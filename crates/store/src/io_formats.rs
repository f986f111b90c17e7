use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use model::LapRecord;
use time::format_description::well_known::Rfc3339;

use crate::StoreError;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io { path: path.to_path_buf(), source }
}

/// Reads one lap per line, skipping blank lines.
pub fn import_ndjson(path: &Path) -> Result<Vec<LapRecord>, StoreError> {
    let f = File::open(path).map_err(io_err(path))?;
    let rdr = BufReader::new(f);
    let mut laps = vec![];
    for (idx, line) in rdr.lines().enumerate() {
        let s = line.map_err(io_err(path))?;
        if s.trim().is_empty() {
            continue;
        }
        let lap: LapRecord = serde_json::from_str(&s)
            .map_err(|source| StoreError::Corrupt { path: path.to_path_buf(), line: idx + 1, source })?;
        laps.push(lap);
    }
    Ok(laps)
}

/// Rewrites the whole file through a temporary sibling so a crash never
/// leaves it half written.
pub fn export_ndjson(laps: &[LapRecord], path: &Path) -> Result<(), StoreError> {
    let tmp = path.with_extension("ndjson.tmp");
    {
        let f = File::create(&tmp).map_err(io_err(&tmp))?;
        let mut w = BufWriter::new(f);
        for l in laps {
            let s = serde_json::to_string(l)?;
            writeln!(w, "{}", s).map_err(io_err(&tmp))?;
        }
        w.flush().map_err(io_err(&tmp))?;
    }
    fs::rename(&tmp, path).map_err(io_err(path))
}

pub(crate) fn append_ndjson(lap: &LapRecord, path: &Path) -> Result<(), StoreError> {
    let line = serde_json::to_string(lap)?;
    let mut f = OpenOptions::new().create(true).append(true).open(path).map_err(io_err(path))?;
    writeln!(f, "{}", line).map_err(io_err(path))
}

pub fn export_csv(laps: &[LapRecord], path: &Path) -> Result<(), StoreError> {
    let mut w = csv::Writer::from_path(path)?;
    w.write_record(["id", "driver_name", "car", "track", "lap_time", "sim", "recorded_at"])?;
    for l in laps {
        let recorded_at = l.recorded_at.format(&Rfc3339).unwrap_or_else(|_| l.recorded_at.to_string());
        w.write_record(&[
            l.id.to_string(),
            l.driver_name.clone(),
            l.car.clone(),
            l.track.clone(),
            format!("{:.3}", l.lap_time),
            l.sim.clone(),
            recorded_at,
        ])?;
    }
    w.flush().map_err(io_err(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::DEFAULT_SIM;
    use time::OffsetDateTime;

    fn lap(id: u64, lap_time: f64) -> LapRecord {
        LapRecord {
            id,
            driver_name: "Player One".into(),
            car: "Porsche 963".into(),
            track: "Spa, Endurance".into(),
            lap_time,
            sim: DEFAULT_SIM.into(),
            recorded_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_ndjson_file_contents_survive_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laps.ndjson");
        export_ndjson(&[lap(1, 140.1), lap(2, 139.9)], &path).unwrap();
        append_ndjson(&lap(3, 138.5), &path).unwrap();

        let laps = import_ndjson(&path).unwrap();
        assert_eq!(laps, vec![lap(1, 140.1), lap(2, 139.9), lap(3, 138.5)]);
        assert!(!path.with_extension("ndjson.tmp").exists());
    }

    #[test]
    fn test_corrupt_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laps.ndjson");
        export_ndjson(&[lap(1, 140.1)], &path).unwrap();
        append_ndjson(&lap(2, 139.0), &path).unwrap();
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "\n{{not json").unwrap();

        match import_ndjson(&path) {
            Err(StoreError::Corrupt { line, .. }) => assert_eq!(line, 4),
            other => panic!("expected corrupt record, got {other:?}"),
        }
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laps.csv");
        export_csv(&[lap(7, 138.5)], &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,driver_name,car,track,lap_time,sim,recorded_at"));
        assert_eq!(
            lines.next(),
            Some("7,Player One,Porsche 963,\"Spa, Endurance\",138.500,LMU,1970-01-01T00:00:00Z")
        );
    }
}
