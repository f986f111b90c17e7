//! Le Mans Ultimate / rFactor 2 scoring feed broadcast as JSON over UDP.

use std::sync::atomic::{AtomicBool, Ordering};

use lap_ingest_core::*;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

/// Top-level field holding the vehicle list. Packets without it are not scoring data.
const VEHICLES_FIELD: &str = "mVehicles";

/// Reduced view of the plugin's scoring document: only what lap tracking needs.
#[derive(Deserialize)]
struct ScoringInfo {
    #[serde(rename = "mTrackName", default)]
    track_name: Option<String>,
    #[serde(rename = "mVehicles")]
    vehicles: Vec<VehicleScoring>,
}

#[derive(Deserialize)]
struct VehicleScoring {
    #[serde(rename = "mIsPlayer", default)]
    is_player: Option<bool>,
    #[serde(rename = "mDriverName", default)]
    driver_name: Option<String>,
    #[serde(rename = "mVehicleName", default)]
    vehicle_name: Option<String>,
    #[serde(rename = "mLastLapTime", default)]
    last_lap_time: Option<f64>, // seconds, -1 when invalid
    #[serde(rename = "mBestLapTime", default)]
    best_lap_time: Option<f64>,
    #[serde(rename = "mTotalLaps", default)]
    total_laps: Option<i32>,
}

impl From<VehicleScoring> for VehicleState {
    fn from(v: VehicleScoring) -> Self {
        Self {
            is_player: v.is_player.unwrap_or(false),
            driver_name: v.driver_name.unwrap_or_default(),
            vehicle_name: v.vehicle_name.unwrap_or_default(),
            last_lap_time: v.last_lap_time.unwrap_or(-1.0),
            best_lap_time_session: v.best_lap_time.unwrap_or(-1.0),
            total_laps: v.total_laps.unwrap_or(0),
        }
    }
}

#[derive(Debug, Default)]
pub struct LmuDecoder {
    structure_logged: AtomicBool,
}

impl LmuDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotDecoder for LmuDecoder {
    fn decode(&self, raw: &[u8]) -> Result<TelemetrySnapshot, DecodeFailure> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| DecodeFailure::MalformedPayload(e.to_string()))?;
        let Value::Object(fields) = &value else {
            return Err(DecodeFailure::MalformedPayload("expected a JSON object".into()));
        };

        if !self.structure_logged.swap(true, Ordering::Relaxed) {
            let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
            info!(?keys, "first telemetry packet");
        }

        if fields.get(VEHICLES_FIELD).map_or(true, Value::is_null) {
            return Err(DecodeFailure::NotTelemetry);
        }

        let scoring: ScoringInfo = serde_json::from_value(value)
            .map_err(|e| DecodeFailure::MalformedPayload(e.to_string()))?;
        Ok(TelemetrySnapshot {
            track_name: scoring.track_name.unwrap_or_default(),
            vehicles: scoring.vehicles.into_iter().map(VehicleState::from).collect(),
        })
    }
}

pub type LmuSource = UdpSource<LmuDecoder>;

/// UDP listener for the LMU feed.
pub fn source(cfg: UdpConfig) -> LmuSource {
    UdpSource::new(cfg, LmuDecoder::new())
}
