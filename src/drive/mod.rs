//! # Drive Module
//!
//! Motion-command pipeline from joystick percentages to ramped motor outputs.
//!
//! This module handles:
//! - Mixing one joystick into left/right wheel speeds ([`steering`])
//! - Acceleration-limited ramping per motor ([`motor`])
//! - The four-wheel vehicle with its tongue actuator ([`vehicle`])

pub mod motor;
pub mod steering;
pub mod vehicle;

pub use motor::{Motor, RampState};
pub use steering::SteeringMixer;
pub use vehicle::Vehicle;
