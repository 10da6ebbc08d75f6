//! # Calibration Module
//!
//! Converts raw stick axis readings into signed percentages.
//!
//! ## Normalization
//!
//! A raw reading is expressed relative to the centre of the axis range and
//! scaled so full deflection is ±100, truncating toward zero:
//!
//! `percent = trunc((raw - center) / half_span * 100)`
//!
//! ## Dead Zone
//!
//! Readings whose magnitude is below the dead zone become exactly 0, which
//! stops a resting stick from creeping the vehicle. Unlike a rescaling dead
//! zone, values just outside it pass through unchanged.
//!
//! ## Inversion
//!
//! evdev reports "stick up" as the low end of the vertical axis. The forward
//! axis is inverted after the dead zone so pushing up drives forward.
//!
//! ```
//! use hitch_rover::controller::calibration::{AxisNormalizer, AxisRange};
//!
//! let forward = AxisNormalizer::new(AxisRange::default(), 10, true);
//! assert_eq!(forward.apply(0), 100);    // stick fully up
//! assert_eq!(forward.apply(135), 0);    // inside dead zone
//! ```

/// Full scale of a normalized axis
pub const AXIS_PERCENT: i32 = 100;

/// Largest accepted dead zone (percent)
pub const MAX_DEAD_ZONE: i32 = 50;

/// Raw limits of an absolute axis as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl Default for AxisRange {
    /// 8-bit stick: 0-255 with 128 as centre
    fn default() -> Self {
        Self { min: 0, max: 255 }
    }
}

impl AxisRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Centre reading (128 for 0-255, 0 for ±32767)
    pub fn center(&self) -> i32 {
        self.min + (self.max - self.min + 1) / 2
    }

    /// Distance from centre to full deflection, never below 1
    pub fn half_span(&self) -> i32 {
        ((self.max - self.min + 1) / 2).max(1)
    }
}

/// Dead zone and direction for one stick axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisNormalizer {
    range: AxisRange,
    dead_zone: i32,
    inverted: bool,
}

impl Default for AxisNormalizer {
    fn default() -> Self {
        Self::new(AxisRange::default(), 10, false)
    }
}

impl AxisNormalizer {
    /// Creates a normalizer.
    ///
    /// # Arguments
    ///
    /// * `range` - Raw axis limits
    /// * `dead_zone` - Percent below which readings become 0. Clamped to 0-50.
    /// * `inverted` - Negate the result (vertical axes)
    #[must_use]
    pub fn new(range: AxisRange, dead_zone: i32, inverted: bool) -> Self {
        Self {
            range,
            dead_zone: dead_zone.clamp(0, MAX_DEAD_ZONE),
            inverted,
        }
    }

    #[must_use]
    pub fn dead_zone(&self) -> i32 {
        self.dead_zone
    }

    #[must_use]
    pub fn range(&self) -> AxisRange {
        self.range
    }

    /// Same settings, different raw range
    #[must_use]
    pub fn with_range(self, range: AxisRange) -> Self {
        Self { range, ..self }
    }

    /// Normalize a raw reading to `-100..=100`.
    #[must_use]
    pub fn apply(&self, raw: i32) -> i32 {
        let offset = (raw - self.range.center()) as f32;
        let percent = (offset / self.range.half_span() as f32 * AXIS_PERCENT as f32) as i32;
        let percent = percent.clamp(-AXIS_PERCENT, AXIS_PERCENT);

        if percent.abs() < self.dead_zone {
            0
        } else if self.inverted {
            -percent
        } else {
            percent
        }
    }
}

/// Normalizers for the drive stick.
///
/// Turn is the horizontal axis as-is; forward is the vertical axis inverted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickCalibration {
    pub turn: AxisNormalizer,
    pub forward: AxisNormalizer,
}

impl Default for StickCalibration {
    fn default() -> Self {
        Self::new(10)
    }
}

impl StickCalibration {
    #[must_use]
    pub fn new(dead_zone: i32) -> Self {
        Self {
            turn: AxisNormalizer::new(AxisRange::default(), dead_zone, false),
            forward: AxisNormalizer::new(AxisRange::default(), dead_zone, true),
        }
    }

    /// Apply a device-reported raw range to both axes
    pub fn set_range(&mut self, range: AxisRange) {
        self.turn = self.turn.with_range(range);
        self.forward = self.forward.with_range(range);
    }
}
