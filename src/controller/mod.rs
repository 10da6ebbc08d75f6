//! # Controller Module
//!
//! Joy-Con (R) input handling.
//!
//! - Device discovery and non-blocking reads via evdev
//! - Stick normalization with dead zone
//! - Event folding into stick position and held buttons
//! - A source/connector seam so the control loop can run against mocks

pub mod calibration;
pub mod joycon;
pub mod mapper;
pub mod source;

pub use joycon::{JoyConConnector, JoyConController};
pub use mapper::{ActuatorCommand, ControllerState, EventMapper};
pub use source::{InputConnector, InputSource};
