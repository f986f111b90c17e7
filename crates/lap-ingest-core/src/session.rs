use tracing::info;

use crate::{TelemetrySnapshot, UNKNOWN};

/// Driver, car and track as first seen by a listener.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionIdentity {
    pub driver: Option<String>,
    pub car: Option<String>,
    pub track: Option<String>,
}

/// Status-only observer. Each field is recorded the first time it shows up
/// and then kept for the lifetime of the tracker; nothing downstream reads it.
#[derive(Debug, Default)]
pub struct SessionTracker {
    identity: SessionIdentity,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn observe(&mut self, snapshot: &TelemetrySnapshot) {
        let Some(player) = snapshot.player() else {
            return;
        };

        if let Some(driver) = record_once(&mut self.identity.driver, &player.driver_name) {
            info!(driver, "session started");
        }
        if let Some(car) = record_once(&mut self.identity.car, &player.vehicle_name) {
            info!(car, "car identified");
        }
        if let Some(track) = record_once(&mut self.identity.track, &snapshot.track_name) {
            info!(track, "track identified");
        }
    }
}

fn record_once<'a>(slot: &'a mut Option<String>, name: &str) -> Option<&'a str> {
    if slot.is_some() {
        return None;
    }
    let name = name.trim();
    if name.is_empty() || name == UNKNOWN {
        return None;
    }
    Some(slot.insert(name.to_string()).as_str())
}
