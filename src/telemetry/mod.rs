//! # Telemetry Module
//!
//! Drive-state recording to JSONL files with rotation.
//!
//! This module handles:
//! - Snapshotting stick input, mixer targets and ramped speeds each tick
//! - Formatting as JSONL (JSON Lines)
//! - Throttling to the configured interval
//! - Managing file rotation (max N records per file)
//! - Retaining only last M files
//!
//! Write failures are reported to the caller, which logs them and carries on.

pub mod logger;
pub mod types;

pub use logger::TelemetryLogger;
pub use types::TelemetryRecord;
