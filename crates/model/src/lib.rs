use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Tag stored in `sim` when a lap doesn't name its simulator.
pub const DEFAULT_SIM: &str = "LMU";

fn default_sim() -> String {
    DEFAULT_SIM.to_string()
}

/// A persisted lap. `id` is assigned by the store and never changes.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct LapRecord {
    pub id: u64,
    pub driver_name: String,
    pub car: String,
    pub track: String,
    /// Seconds, millisecond precision, always > 0.
    pub lap_time: f64,
    #[serde(default = "default_sim")]
    pub sim: String,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

impl LapRecord {
    pub fn is_combo(&self, driver_name: &str, car: &str, track: &str) -> bool {
        self.driver_name == driver_name && self.car == car && self.track == track
    }
}

/// A lap waiting to be inserted.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct NewLap {
    pub driver_name: String,
    pub car: String,
    pub track: String,
    pub lap_time: f64,
    #[serde(default = "default_sim")]
    pub sim: String,
}

impl NewLap {
    pub fn new(
        driver_name: impl Into<String>,
        car: impl Into<String>,
        track: impl Into<String>,
        lap_time: f64,
    ) -> Self {
        Self {
            driver_name: driver_name.into(),
            car: car.into(),
            track: track.into(),
            lap_time,
            sim: default_sim(),
        }
    }

    pub fn with_sim(mut self, sim: impl Into<String>) -> Self {
        self.sim = sim.into();
        self
    }
}

/// Optional track/car restriction for best-lap listings.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct BestLapFilter {
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub car: Option<String>,
}

impl BestLapFilter {
    pub fn matches(&self, lap: &LapRecord) -> bool {
        self.track.as_deref().map_or(true, |t| t == lap.track)
            && self.car.as_deref().map_or(true, |c| c == lap.car)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct LapStats {
    pub total_laps: u64,
    pub best_lap: Option<LapRecord>,
    pub unique_tracks: u64,
    pub unique_cars: u64,
}

/// Rounds to the millisecond precision laps are stored with.
pub fn round_lap_time(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// `m:ss.sss`, e.g. `1:32.345`.
pub fn format_lap_time(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let mins = millis / 60_000;
    let rem = millis % 60_000;
    format!("{}:{:02}.{:03}", mins, rem / 1000, rem % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(track: &str, car: &str) -> LapRecord {
        LapRecord {
            id: 1,
            driver_name: "A. Driver".to_string(),
            car: car.to_string(),
            track: track.to_string(),
            lap_time: 92.345,
            sim: DEFAULT_SIM.to_string(),
            recorded_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_format_lap_time() {
        assert_eq!(format_lap_time(92.345), "1:32.345");
        assert_eq!(format_lap_time(59.9999), "1:00.000");
        assert_eq!(format_lap_time(5.1), "0:05.100");
        assert_eq!(format_lap_time(-1.0), "0:00.000");
    }

    #[test]
    fn test_round_lap_time() {
        assert_eq!(round_lap_time(88.10249), 88.102);
        assert_eq!(round_lap_time(90.0), 90.0);
    }

    #[test]
    fn test_filter_matches() {
        let lap = record("Spa", "Porsche 963");
        assert!(BestLapFilter::default().matches(&lap));
        let by_track = BestLapFilter { track: Some("Spa".into()), car: None };
        assert!(by_track.matches(&lap));
        let wrong_car = BestLapFilter { track: Some("Spa".into()), car: Some("BMW M4".into()) };
        assert!(!wrong_car.matches(&lap));
    }

    #[test]
    fn test_new_lap_defaults_sim() {
        let lap: NewLap = serde_json::from_str(
            r#"{"driver_name":"A","car":"B","track":"C","lap_time":80.5}"#,
        )
        .unwrap();
        assert_eq!(lap.sim, DEFAULT_SIM);
        assert_eq!(NewLap::new("A", "B", "C", 80.5), lap);
    }

    #[test]
    fn test_record_json_shape() {
        let v = serde_json::to_value(record("Monza", "Ferrari 499P")).unwrap();
        assert_eq!(v["recorded_at"], "1970-01-01T00:00:00Z");
        assert_eq!(v["lap_time"], 92.345);
        assert_eq!(v["driver_name"], "A. Driver");
    }
}
