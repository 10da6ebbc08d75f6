//! # Motor Module
//!
//! One physical drive output with acceleration-limited ramping.
//!
//! ## Ramping
//!
//! [`Motor::set_speed`] only records a target. Each call to
//! [`Motor::update`] moves the current speed toward the target by at most
//! `acceleration * dt`, where `dt` is the monotonic time since the previous
//! update, and snaps exactly onto the target once it is within reach. The
//! owner must call `update` at a steady rate; if it stops, the output freezes
//! at the last written value.
//!
//! ## Output
//!
//! The signed speed maps onto two duty channels: magnitude is the duty in
//! percent, sign selects forward or reverse. The idle channel is always
//! zeroed before the active one is driven, so both are never on together.
//!
//! ```
//! use hitch_rover::drive::Motor;
//! use hitch_rover::hardware::SimulatedOutput;
//!
//! let mut motor = Motor::new("Front Left", Box::new(SimulatedOutput::new("Front Left")), 400.0);
//! motor.set_speed(150);
//! assert_eq!(motor.target_speed(), 100.0);
//! assert_eq!(motor.current_speed(), 0.0);
//! ```

use tokio::time::Instant;
use tracing::{debug, error};

use super::steering::SPEED_RANGE;
use crate::error::Result;
use crate::hardware::HardwareOutput;

/// Lowest accepted ramp rate in speed units per second
pub const MIN_ACCELERATION: f32 = 1.0;

/// Ramp bookkeeping for one motor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampState {
    /// Speed currently applied to the output
    pub current: f32,
    /// Speed the ramp is heading for
    pub target: f32,
    /// Maximum change per second
    pub acceleration: f32,
    /// Time of the previous `advance`
    pub last_update: Instant,
}

impl RampState {
    pub fn new(acceleration: f32, now: Instant) -> Self {
        Self {
            current: 0.0,
            target: 0.0,
            acceleration: acceleration.max(MIN_ACCELERATION),
            last_update: now,
        }
    }

    /// Move `current` toward `target` for the time elapsed since the last call.
    ///
    /// A `now` earlier than the previous update counts as zero elapsed time.
    pub fn advance(&mut self, now: Instant) -> f32 {
        let dt = now.saturating_duration_since(self.last_update).as_secs_f32();
        self.last_update = now;

        let max_change = self.acceleration * dt;
        let delta = self.target - self.current;
        if delta.abs() <= max_change {
            self.current = self.target;
        } else {
            self.current += max_change.copysign(delta);
        }
        self.current
    }

    /// Whether `current` has reached `target`
    pub fn settled(&self) -> bool {
        self.current == self.target
    }
}

#[inline]
fn clamp_command(speed: i32) -> f32 {
    speed.clamp(-SPEED_RANGE, SPEED_RANGE) as f32
}

/// One ramped H-bridge output
pub struct Motor {
    name: &'static str,
    output: Box<dyn HardwareOutput>,
    ramp: RampState,
    /// Last signed speed successfully pushed to the output
    written: Option<f32>,
    faulted: bool,
}

impl std::fmt::Debug for Motor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Motor")
            .field("name", &self.name)
            .field("ramp", &self.ramp)
            .field("faulted", &self.faulted)
            .finish_non_exhaustive()
    }
}

impl Motor {
    /// Create a stopped motor. Nothing is written until the first update.
    pub fn new(name: &'static str, output: Box<dyn HardwareOutput>, acceleration: f32) -> Self {
        Self {
            name,
            output,
            ramp: RampState::new(acceleration, Instant::now()),
            written: None,
            faulted: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn current_speed(&self) -> f32 {
        self.ramp.current
    }

    pub fn target_speed(&self) -> f32 {
        self.ramp.target
    }

    pub fn acceleration(&self) -> f32 {
        self.ramp.acceleration
    }

    pub fn ramp(&self) -> &RampState {
        &self.ramp
    }

    /// True once an output write has failed
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Set the ramp target. Out-of-range values are clamped.
    pub fn set_speed(&mut self, speed: i32) {
        self.ramp.target = clamp_command(speed);
    }

    /// Jump straight to `speed` and write it now, bypassing the ramp.
    ///
    /// # Errors
    ///
    /// Returns `Hardware` if the output rejects the write. The ramp state is
    /// updated regardless.
    pub fn set_speed_instant(&mut self, speed: i32) -> Result<()> {
        let speed = clamp_command(speed);
        self.ramp.current = speed;
        self.ramp.target = speed;
        self.write_output(speed)
    }

    /// Ramp down to zero
    pub fn stop(&mut self) {
        self.set_speed(0);
    }

    /// Zero immediately. Attempted even on a faulted motor.
    pub fn emergency_stop(&mut self) -> Result<()> {
        self.set_speed_instant(0)
    }

    /// Change the ramp rate; anything below 1 unit/s (including NaN) becomes 1.
    pub fn set_acceleration(&mut self, rate: f32) {
        self.ramp.acceleration = rate.max(MIN_ACCELERATION);
    }

    /// Advance the ramp to the current time and write the result.
    pub fn update(&mut self) -> Result<()> {
        self.update_at(Instant::now())
    }

    /// Advance the ramp to `now` and write the result if it changed.
    ///
    /// A faulted motor keeps its ramp bookkeeping but is no longer written.
    pub fn update_at(&mut self, now: Instant) -> Result<()> {
        let speed = self.ramp.advance(now);
        if self.faulted || self.written == Some(speed) {
            return Ok(());
        }
        self.write_output(speed)
    }

    /// Hand the output back to the system
    pub fn release(&mut self) -> Result<()> {
        self.written = None;
        self.output.release()
    }

    fn write_output(&mut self, speed: f32) -> Result<()> {
        match self.write_channels(speed) {
            Ok(()) => {
                self.written = Some(speed);
                Ok(())
            }
            Err(e) => {
                self.written = None;
                if !self.faulted {
                    error!("{} output failed, motor disabled: {}", self.name, e);
                }
                self.faulted = true;
                Err(e)
            }
        }
    }

    fn write_channels(&mut self, speed: f32) -> Result<()> {
        let duty = speed.abs().min(SPEED_RANGE as f32);
        if speed > 0.0 {
            self.output.write_reverse(0.0)?;
            self.output.write_forward(duty)?;
        } else if speed < 0.0 {
            self.output.write_forward(0.0)?;
            self.output.write_reverse(duty)?;
        } else {
            self.output.write_forward(0.0)?;
            self.output.write_reverse(0.0)?;
        }
        debug!("{}: speed {:.1}", self.name, speed);
        Ok(())
    }
}
