//! # Steering Mixers
//!
//! Turn a single two-axis joystick into independent left/right wheel speeds.
//!
//! All strategies share one contract: `compute(turn, forward)` with both
//! inputs in `-100..=100` returns `(left, right)` in `-100..=100`. They are
//! pure; the only state is configuration.
//!
//! ## Strategies
//!
//! | Strategy | Behaviour |
//! |----------|-----------|
//! | Differential | Continuous arc mix, blends into a pivot near zero forward |
//! | Four-direction | Forward, backward, spin right, spin left |
//! | Eight-direction | Adds diagonals that drive one side and park the other |
//!
//! ```
//! use hitch_rover::drive::steering::SteeringMixer;
//!
//! let mixer = SteeringMixer::differential(25);
//! assert_eq!(mixer.compute(0, 100), (100, 100));
//! assert_eq!(mixer.compute(100, 0), (100, -100));
//! ```

use crate::config::{DriveConfig, SteeringMode};

/// Full scale for every speed in the drive train
pub const SPEED_RANGE: i32 = 100;

/// tan(22.5°): boundary between a straight sector and a diagonal one
const SECTOR_THRESHOLD: f32 = 0.414_213_56;

/// Clamp a speed to `-100..=100`
#[inline]
pub fn clamp_speed(value: i32) -> i32 {
    value.clamp(-SPEED_RANGE, SPEED_RANGE)
}

/// Steering strategy, chosen once at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteeringMixer {
    /// Continuous differential mix. `pivot_y_limit` is the forward magnitude
    /// at and below which pivot blending starts.
    Differential { pivot_y_limit: i32 },
    /// Four-way snap
    FourDirection,
    /// Eight-way snap
    EightDirection,
}

impl Default for SteeringMixer {
    fn default() -> Self {
        Self::differential(25)
    }
}

impl SteeringMixer {
    /// Differential mixer with the given pivot limit (floored at 1)
    #[must_use]
    pub fn differential(pivot_y_limit: i32) -> Self {
        Self::Differential {
            pivot_y_limit: pivot_y_limit.clamp(1, SPEED_RANGE),
        }
    }

    /// Mixer described by the drive configuration
    #[must_use]
    pub fn from_config(config: &DriveConfig) -> Self {
        match config.steering {
            SteeringMode::Differential => Self::differential(config.pivot_y_limit),
            SteeringMode::FourDirection => Self::FourDirection,
            SteeringMode::EightDirection => Self::EightDirection,
        }
    }

    /// Compute `(left, right)` wheel speeds.
    ///
    /// Inputs outside `-100..=100` are clamped first.
    #[must_use]
    pub fn compute(&self, turn: i32, forward: i32) -> (i32, i32) {
        let turn = clamp_speed(turn);
        let forward = clamp_speed(forward);

        let (left, right) = match *self {
            Self::Differential { pivot_y_limit } => mix_differential(turn, forward, pivot_y_limit),
            Self::FourDirection => snap_four(turn, forward),
            Self::EightDirection => snap_eight(turn, forward),
        };
        (clamp_speed(left), clamp_speed(right))
    }
}

fn mix_differential(turn: i32, forward: i32, pivot_y_limit: i32) -> (i32, i32) {
    let range = SPEED_RANGE as f32;
    let x = turn as f32;
    let y = forward as f32;

    // Arc component: the inside wheel slows in proportion to turn
    let (premix_l, premix_r) = match (forward >= 0, turn >= 0) {
        (true, true) => (range, range - x),
        (true, false) => (range + x, range),
        (false, true) => (range - x, range),
        (false, false) => (range, range + x),
    };
    let premix_l = premix_l * y / range;
    let premix_r = premix_r * y / range;

    let limit = pivot_y_limit as f32;
    let pivot_scale = if y.abs() > limit {
        0.0
    } else {
        1.0 - y.abs() / limit
    };

    let left = (1.0 - pivot_scale) * premix_l + pivot_scale * x;
    let right = (1.0 - pivot_scale) * premix_r + pivot_scale * -x;
    (left.round() as i32, right.round() as i32)
}

fn magnitude(turn: i32, forward: i32) -> i32 {
    let (x, y) = (turn as f32, forward as f32);
    (x * x + y * y).sqrt().min(SPEED_RANGE as f32).round() as i32
}

fn snap_four(turn: i32, forward: i32) -> (i32, i32) {
    if turn == 0 && forward == 0 {
        return (0, 0);
    }
    let mag = magnitude(turn, forward);

    // Ties go to the turn axis
    if forward.abs() > turn.abs() {
        if forward > 0 {
            (mag, mag)
        } else {
            (-mag, -mag)
        }
    } else if turn > 0 {
        (mag, -mag)
    } else {
        (-mag, mag)
    }
}

fn snap_eight(turn: i32, forward: i32) -> (i32, i32) {
    if turn == 0 && forward == 0 {
        return (0, 0);
    }
    let mag = magnitude(turn, forward);
    let abs_x = turn.abs() as f32;
    let abs_y = forward.abs() as f32;

    let mostly_forward = abs_x < abs_y * SECTOR_THRESHOLD;
    let mostly_sideways = abs_y < abs_x * SECTOR_THRESHOLD;

    if mostly_forward {
        // N or S
        if forward > 0 {
            (mag, mag)
        } else {
            (-mag, -mag)
        }
    } else if mostly_sideways {
        // E or W: spin in place
        if turn > 0 {
            (mag, -mag)
        } else {
            (-mag, mag)
        }
    } else {
        // Diagonals drive the outside wheels and park the inside ones
        match (forward > 0, turn > 0) {
            (true, true) => (mag, 0),
            (true, false) => (0, mag),
            (false, true) => (-mag, 0),
            (false, false) => (0, -mag),
        }
    }
}
