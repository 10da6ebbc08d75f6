//! Trait abstraction over the input device so the control loop can be
//! driven by mocks in tests.

use evdev::InputEvent;

use super::calibration::AxisRange;
use crate::error::Result;

/// A connected controller
#[cfg_attr(test, mockall::automock)]
pub trait InputSource: Send {
    /// Drain whatever events are pending without blocking.
    ///
    /// An empty vector means nothing arrived since the last call.
    fn poll(&mut self) -> Result<Vec<InputEvent>>;

    /// `false` once the device has gone away
    fn is_connected(&self) -> bool;

    /// Raw limits of the drive stick axes
    fn stick_range(&self) -> AxisRange;

    /// Human-readable identity for logs
    fn describe(&self) -> String;
}

/// Finds and opens controllers
#[cfg_attr(test, mockall::automock)]
pub trait InputConnector: Send {
    /// One discovery attempt.
    ///
    /// # Errors
    ///
    /// `ControllerNotFound` when nothing matches; the caller retries later.
    fn connect(&mut self) -> Result<Box<dyn InputSource>>;
}
