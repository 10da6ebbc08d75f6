//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and every field has a default, so an empty file (or no file
//! at all, see [`Config::load_or_default`]) yields a runnable configuration.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Result, RoverError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub drive: DriveConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub hardware: HardwareConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    /// evdev device name to look for (case-insensitive).
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Dead zone in percent of full stick deflection.
    #[serde(default = "default_dead_zone")]
    pub dead_zone: i32,

    /// Delay between discovery attempts while no controller is present.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Steering strategy selected at startup
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SteeringMode {
    /// Continuous differential mix with pivot blending
    #[default]
    Differential,
    /// Snap to forward, backward, spin left, spin right
    FourDirection,
    /// Snap to eight compass sectors, diagonals drive one side only
    EightDirection,
}

/// Drive train configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DriveConfig {
    #[serde(default)]
    pub steering: SteeringMode,

    /// Forward magnitude below which the differential mixer blends in a pivot.
    #[serde(default = "default_pivot_y_limit")]
    pub pivot_y_limit: i32,

    #[serde(default = "default_max_speed_percent")]
    pub max_speed_percent: i32,

    /// Wheel ramp rate in speed units per second.
    #[serde(default = "default_acceleration")]
    pub drive_acceleration: f32,

    /// Actuator ramp rate in speed units per second.
    #[serde(default = "default_acceleration")]
    pub actuator_acceleration: f32,

    /// Speed used when the raise/lower buttons are held.
    #[serde(default = "default_actuator_speed")]
    pub actuator_speed: i32,
}

/// Safety configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SafetyConfig {
    /// Stop the vehicle when no input event arrived for this long.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    #[serde(default = "default_loop_rate_hz")]
    pub loop_rate_hz: u32,
}

/// Output backend selection
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HardwareBackend {
    /// In-memory outputs, nothing leaves the process
    #[default]
    Simulated,
    /// Linux sysfs PWM channels (e.g. a PCA9685 exposed as a pwmchip)
    Sysfs,
}

/// Output hardware configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HardwareConfig {
    #[serde(default)]
    pub backend: HardwareBackend,

    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: String,

    #[serde(default = "default_pwm_frequency_hz")]
    pub pwm_frequency_hz: u32,

    #[serde(default)]
    pub motors: MotorsConfig,
}

/// Channel assignment for every motor on the vehicle
#[derive(Debug, Deserialize, Clone)]
pub struct MotorsConfig {
    #[serde(default = "default_front_left")]
    pub front_left: MotorPinConfig,

    #[serde(default = "default_front_right")]
    pub front_right: MotorPinConfig,

    #[serde(default = "default_rear_left")]
    pub rear_left: MotorPinConfig,

    #[serde(default = "default_rear_right")]
    pub rear_right: MotorPinConfig,

    #[serde(default = "default_actuator")]
    pub actuator: MotorPinConfig,
}

/// Forward/reverse PWM channels of one H-bridge, plus its optional enable line
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct MotorPinConfig {
    #[serde(default)]
    pub pwm_chip: u32,

    pub forward_channel: u32,

    pub reverse_channel: u32,

    #[serde(default)]
    pub enable_gpio: Option<u32>,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Log sink configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for a daily rolling log file. Empty means stdout only.
    #[serde(default)]
    pub file_dir: String,
}

// Default value functions
fn default_device_name() -> String { "Joy-Con (R)".to_string() }
fn default_dead_zone() -> i32 { 10 }
fn default_reconnect_interval_ms() -> u64 { 3000 }

fn default_pivot_y_limit() -> i32 { 25 }
fn default_max_speed_percent() -> i32 { 50 }
fn default_acceleration() -> f32 { 400.0 }
fn default_actuator_speed() -> i32 { 100 }

fn default_command_timeout_ms() -> u64 { 1500 }
fn default_loop_rate_hz() -> u32 { 20 }

fn default_sysfs_root() -> String { "/sys/class".to_string() }
fn default_pwm_frequency_hz() -> u32 { 10000 }

fn motor_pins(forward_channel: u32, reverse_channel: u32) -> MotorPinConfig {
    MotorPinConfig {
        pwm_chip: 0,
        forward_channel,
        reverse_channel,
        enable_gpio: None,
    }
}
fn default_front_left() -> MotorPinConfig { motor_pins(0, 1) }
fn default_front_right() -> MotorPinConfig { motor_pins(2, 3) }
fn default_rear_left() -> MotorPinConfig { motor_pins(4, 5) }
fn default_rear_right() -> MotorPinConfig { motor_pins(6, 7) }
fn default_actuator() -> MotorPinConfig { motor_pins(8, 9) }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_log_interval_ms() -> u64 { 100 }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            dead_zone: default_dead_zone(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            steering: SteeringMode::default(),
            pivot_y_limit: default_pivot_y_limit(),
            max_speed_percent: default_max_speed_percent(),
            drive_acceleration: default_acceleration(),
            actuator_acceleration: default_acceleration(),
            actuator_speed: default_actuator_speed(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout_ms(),
            loop_rate_hz: default_loop_rate_hz(),
        }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: HardwareBackend::default(),
            sysfs_root: default_sysfs_root(),
            pwm_frequency_hz: default_pwm_frequency_hz(),
            motors: MotorsConfig::default(),
        }
    }
}

impl Default for MotorsConfig {
    fn default() -> Self {
        Self {
            front_left: default_front_left(),
            front_right: default_front_right(),
            rear_left: default_rear_left(),
            rear_right: default_rear_right(),
            actuator: default_actuator(),
        }
    }
}

impl MotorsConfig {
    /// Pin assignments in vehicle order: front-left, front-right, rear-left,
    /// rear-right, actuator.
    pub fn in_order(&self) -> [MotorPinConfig; 5] {
        [
            self.front_left,
            self.front_right,
            self.rear_left,
            self.rear_right,
            self.actuator,
        ]
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            log_interval_ms: default_log_interval_ms(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hitch_rover::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is missing.
    ///
    /// A file that exists but fails to parse or validate is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file {} not found, using built-in defaults", path.display());
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }

        let config = Self::load(path)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.controller.device_name.trim().is_empty() {
            return Err(RoverError::config("controller device_name cannot be empty"));
        }

        if !(0..=50).contains(&self.controller.dead_zone) {
            return Err(RoverError::config("dead_zone must be between 0 and 50"));
        }

        if self.controller.reconnect_interval_ms == 0 || self.controller.reconnect_interval_ms > 60000 {
            return Err(RoverError::config("reconnect_interval_ms must be between 1 and 60000"));
        }

        if !(1..=100).contains(&self.drive.pivot_y_limit) {
            return Err(RoverError::config("pivot_y_limit must be between 1 and 100"));
        }

        if !(0..=100).contains(&self.drive.max_speed_percent) {
            return Err(RoverError::config("max_speed_percent must be between 0 and 100"));
        }

        if !(0..=100).contains(&self.drive.actuator_speed) {
            return Err(RoverError::config("actuator_speed must be between 0 and 100"));
        }

        // Non-positive rates are floor-clamped by the motors; only NaN/inf is rejected
        for (name, value) in [
            ("drive_acceleration", self.drive.drive_acceleration),
            ("actuator_acceleration", self.drive.actuator_acceleration),
        ] {
            if !value.is_finite() {
                return Err(RoverError::config(format!("{} must be a finite number", name)));
            }
        }

        if self.safety.command_timeout_ms == 0 || self.safety.command_timeout_ms > 60000 {
            return Err(RoverError::config("command_timeout_ms must be between 1 and 60000"));
        }

        if self.safety.loop_rate_hz == 0 || self.safety.loop_rate_hz > 200 {
            return Err(RoverError::config("loop_rate_hz must be between 1 and 200"));
        }

        if self.hardware.backend == HardwareBackend::Sysfs {
            if self.hardware.sysfs_root.is_empty() {
                return Err(RoverError::config("sysfs_root cannot be empty for the sysfs backend"));
            }

            if self.hardware.pwm_frequency_hz == 0 || self.hardware.pwm_frequency_hz > 100_000 {
                return Err(RoverError::config("pwm_frequency_hz must be between 1 and 100000"));
            }

            let mut used = HashSet::new();
            for pins in self.hardware.motors.in_order() {
                if pins.forward_channel == pins.reverse_channel {
                    return Err(RoverError::config(format!(
                        "forward and reverse channel must differ (pwmchip{} channel {})",
                        pins.pwm_chip, pins.forward_channel
                    )));
                }
                for channel in [pins.forward_channel, pins.reverse_channel] {
                    if !used.insert((pins.pwm_chip, channel)) {
                        return Err(RoverError::config(format!(
                            "pwmchip{} channel {} is assigned to more than one motor",
                            pins.pwm_chip, channel
                        )));
                    }
                }
            }
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(RoverError::config("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(RoverError::config("log_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(RoverError::config("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(RoverError::config("max_files_to_keep must be greater than 0"));
        }

        Ok(())
    }
}
