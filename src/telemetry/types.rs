//! Telemetry record format.
//!
//! One record per line, for example:
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.050Z","state":"ready","turn":0,"forward":80,
//!  "left_target":40,"right_target":40,"wheel_speeds":[20.0,20.0,20.0,20.0],
//!  "actuator_speed":0.0,"stale":false}
//! ```

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::supervisor::LoopState;

/// Snapshot of the drive pipeline at one control tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// Wall-clock time, RFC 3339 with milliseconds
    pub timestamp: String,
    pub state: LoopState,
    /// Normalized stick input
    pub turn: i32,
    pub forward: i32,
    /// Mixer output after the speed limit
    pub left_target: i32,
    pub right_target: i32,
    /// Ramped speeds: front-left, front-right, rear-left, rear-right
    pub wheel_speeds: [f32; 4],
    pub actuator_speed: f32,
    pub stale: bool,
}

impl TelemetryRecord {
    /// Record stamped with the current wall-clock time
    pub fn now(state: LoopState) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            state,
            turn: 0,
            forward: 0,
            left_target: 0,
            right_target: 0,
            wheel_speeds: [0.0; 4],
            actuator_speed: 0.0,
            stale: false,
        }
    }
}
