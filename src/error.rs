//! # Error Types
//!
//! Custom error types for Hitch Rover using `thiserror`.
//!
//! Stale input and out-of-range speed commands are deliberately absent:
//! the first is a supervisor state, the second is clamped where it happens.

use thiserror::Error;

/// Main error type for Hitch Rover
#[derive(Debug, Error)]
pub enum RoverError {
    /// No matching input device is present (retried by the supervisor)
    #[error("Controller not found: {0}")]
    ControllerNotFound(String),

    /// A previously connected input device stopped responding
    #[error("Controller disconnected")]
    ControllerDisconnected,

    /// Other controller I/O errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// A write to one motor's output channels failed
    #[error("Hardware error on {motor}: {message}")]
    Hardware { motor: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Telemetry serialization errors
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RoverError {
    /// Builds a [`RoverError::Hardware`] for the named motor.
    pub fn hardware(motor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hardware {
            motor: motor.into(),
            message: message.into(),
        }
    }

    /// Builds a [`RoverError::Config`] from a validation message.
    pub fn config(message: impl std::fmt::Display) -> Self {
        use serde::de::Error;
        Self::Config(toml::de::Error::custom(message))
    }
}

/// Result type alias for Hitch Rover
pub type Result<T> = std::result::Result<T, RoverError>;
