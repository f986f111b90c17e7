//! Core telemetry model, decoder contract and lap detection used by the tracker

use serde::{Deserialize, Serialize};

mod detector;
mod session;
mod udp;

pub use detector::{DetectorState, LapDetector};
pub use session::{SessionIdentity, SessionTracker};
pub use udp::{UdpConfig, UdpSource};

/// Placeholder used wherever the feed leaves a name blank.
pub const UNKNOWN: &str = "Unknown";

/// One decoded telemetry packet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub track_name: String,
    pub vehicles: Vec<VehicleState>,
}

impl TelemetrySnapshot {
    /// The vehicle flagged as driven by the local player, if any.
    pub fn player(&self) -> Option<&VehicleState> {
        self.vehicles.iter().find(|v| v.is_player)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub is_player: bool,
    pub driver_name: String,
    pub vehicle_name: String,

    // lap stuff, seconds; the sim reports a negative value until a lap is valid
    pub last_lap_time: f64,
    pub best_lap_time_session: f64,
    pub total_laps: i32,
}

/// Emitted once per distinct completed lap of the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapCompleted {
    pub driver_name: String,
    pub car: String,
    pub track: String,
    pub lap_time: f64,
    pub total_laps: i32,
    pub best_lap_time_session: Option<f64>,
}

impl LapCompleted {
    /// Lap number as announced to the driver.
    pub fn lap_number(&self) -> i32 {
        self.total_laps.saturating_sub(1).max(0)
    }
}

/// Trimmed name, or [`UNKNOWN`] when blank.
pub fn name_or_unknown(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        UNKNOWN.to_string()
    } else {
        name.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeFailure {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("packet carries no vehicle data")]
    NotTelemetry,
}

/// Transport faults. These stop the listener and are handed to its owner.
#[derive(Debug, thiserror::Error)]
pub enum ListenerFault {
    #[error("failed to bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to receive datagram")]
    Receive(#[source] std::io::Error),
}

/// Turns one raw datagram into a snapshot. Implement this to support another feed.
pub trait SnapshotDecoder: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<TelemetrySnapshot, DecodeFailure>;
}

pub type SnapshotTx = tokio::sync::mpsc::UnboundedSender<TelemetrySnapshot>;
pub type SnapshotRx = tokio::sync::mpsc::UnboundedReceiver<TelemetrySnapshot>;

/// Trait for any live source connector
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Runs until the receiving side goes away or the transport fails.
    async fn run(&self, tx: SnapshotTx) -> Result<(), ListenerFault>;
}

pub fn channel() -> (SnapshotTx, SnapshotRx) {
    tokio::sync::mpsc::unbounded_channel()
}
