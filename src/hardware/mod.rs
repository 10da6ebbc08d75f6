//! # Hardware Output Module
//!
//! Duty-cycle outputs for the H-bridge motor drivers.
//!
//! This module handles:
//! - The per-motor [`HardwareOutput`] capability (forward channel, reverse channel, release)
//! - Naming of the five motor positions on the vehicle
//! - Opening the configured backend for all five motors at once

pub mod simulated;
pub mod sysfs;

use tracing::{info, warn};

use crate::config::{HardwareBackend, HardwareConfig};
use crate::error::Result;

pub use simulated::{OutputSnapshot, SimulatedOutput, SimulatedOutputHandle};
pub use sysfs::SysfsPwmOutput;

/// One H-bridge: two duty channels and a release.
///
/// Duty values are percentages in `0.0..=100.0`. Callers are responsible for
/// never leaving both channels non-zero at once; [`crate::drive::Motor`]
/// always zeroes the idle channel before driving the active one.
pub trait HardwareOutput: Send {
    /// Drive the forward channel at `duty` percent
    fn write_forward(&mut self, duty: f32) -> Result<()>;

    /// Drive the reverse channel at `duty` percent
    fn write_reverse(&mut self, duty: f32) -> Result<()>;

    /// Turn both channels off and hand the pins back to the system
    fn release(&mut self) -> Result<()>;
}

/// Motor positions, in the order the vehicle owns them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorChannel {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
    Actuator,
}

impl MotorChannel {
    /// All positions in vehicle order.
    pub const ALL: [MotorChannel; 5] = [
        MotorChannel::FrontLeft,
        MotorChannel::FrontRight,
        MotorChannel::RearLeft,
        MotorChannel::RearRight,
        MotorChannel::Actuator,
    ];

    /// Human-readable name used in logs and errors
    pub fn name(self) -> &'static str {
        match self {
            MotorChannel::FrontLeft => "Front Left",
            MotorChannel::FrontRight => "Front Right",
            MotorChannel::RearLeft => "Rear Left",
            MotorChannel::RearRight => "Rear Right",
            MotorChannel::Actuator => "Actuator",
        }
    }
}

impl std::fmt::Display for MotorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outputs for all five motors, in [`MotorChannel::ALL`] order
pub type MotorOutputs = [Box<dyn HardwareOutput>; 5];

/// Open the configured backend for every motor.
///
/// If any motor fails to open, the outputs opened so far are released before
/// the error is returned.
///
/// # Errors
///
/// Returns the first backend error; this is an unrecoverable hardware
/// initialisation failure for the caller.
pub fn open_outputs(config: &HardwareConfig) -> Result<MotorOutputs> {
    match config.backend {
        HardwareBackend::Simulated => {
            info!("Using simulated motor outputs (no hardware will move)");
            Ok(MotorChannel::ALL.map(|channel| {
                Box::new(SimulatedOutput::new(channel.name())) as Box<dyn HardwareOutput>
            }))
        }
        HardwareBackend::Sysfs => {
            let mut opened: Vec<Box<dyn HardwareOutput>> = Vec::with_capacity(5);
            for (channel, pins) in MotorChannel::ALL.iter().zip(config.motors.in_order()) {
                match SysfsPwmOutput::open(
                    &config.sysfs_root,
                    channel.name(),
                    pins,
                    config.pwm_frequency_hz,
                ) {
                    Ok(output) => opened.push(Box::new(output)),
                    Err(e) => {
                        for output in opened.iter_mut() {
                            if let Err(release_err) = output.release() {
                                warn!("Release after failed open: {}", release_err);
                            }
                        }
                        return Err(e);
                    }
                }
            }
            info!("Opened sysfs PWM outputs under {}", config.sysfs_root);
            opened.try_into().map_err(|_| {
                crate::error::RoverError::hardware("vehicle", "expected exactly five motor outputs")
            })
        }
    }
}
