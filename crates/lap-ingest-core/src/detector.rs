use tracing::debug;

use crate::{name_or_unknown, LapCompleted, TelemetrySnapshot};

/// What the detector remembers between snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorState {
    last_recorded_lap_time: Option<f64>,
}

impl DetectorState {
    pub fn last_recorded_lap_time(&self) -> Option<f64> {
        self.last_recorded_lap_time
    }
}

/// Last values seen for the session-change heuristic.
#[derive(Debug, Default)]
struct SessionBoundary {
    track: Option<String>,
    total_laps: Option<i32>,
}

impl SessionBoundary {
    /// True when the lap counter went backwards or the track changed.
    fn crossed(&mut self, track: &str, total_laps: i32) -> bool {
        let laps_reset = matches!(self.total_laps, Some(prev) if total_laps < prev);
        let track_changed = matches!(&self.track, Some(prev) if prev != track);
        if self.track.as_deref() != Some(track) {
            self.track = Some(track.to_string());
        }
        self.total_laps = Some(total_laps);
        laps_reset || track_changed
    }
}

/// Edge detector over the player's last-lap-time.
///
/// The feed keeps repeating the same last-lap-time until the next lap is
/// done, so a lap is reported only when that value is valid and differs from
/// the one reported before. One detector per listener; it is not shared.
#[derive(Debug, Default)]
pub struct LapDetector {
    state: DetectorState,
    boundary: Option<SessionBoundary>,
}

impl LapDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector that forgets its last lap when the lap counter drops or the
    /// track changes, so an identical lap time in a new session still counts.
    pub fn with_session_reset() -> Self {
        Self {
            state: DetectorState::default(),
            boundary: Some(SessionBoundary::default()),
        }
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn on_snapshot(&mut self, snapshot: &TelemetrySnapshot) -> Option<LapCompleted> {
        let player = snapshot.player()?;

        if let Some(boundary) = self.boundary.as_mut() {
            if boundary.crossed(snapshot.track_name.trim(), player.total_laps)
                && self.state.last_recorded_lap_time.is_some()
            {
                debug!(track = %snapshot.track_name, total_laps = player.total_laps, "session change, clearing last lap");
                self.state = DetectorState::default();
            }
        }

        let lap_time = player.last_lap_time;
        if lap_time.is_nan() || lap_time <= 0.0 {
            return None;
        }
        if self.state.last_recorded_lap_time == Some(lap_time) {
            return None;
        }
        self.state.last_recorded_lap_time = Some(lap_time);

        let best = player.best_lap_time_session;
        Some(LapCompleted {
            driver_name: name_or_unknown(&player.driver_name),
            car: name_or_unknown(&player.vehicle_name),
            track: name_or_unknown(&snapshot.track_name),
            lap_time,
            total_laps: player.total_laps,
            best_lap_time_session: (best > 0.0).then_some(best),
        })
    }
}
