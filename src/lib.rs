//! # Hitch Rover Library
//!
//! Drive a four-wheel trailer mover and its tongue actuator from a Joy-Con.
//!
//! The stick is mixed into left/right wheel speeds, every motor ramps toward
//! its target under an acceleration limit, and a supervisor stops everything
//! when the controller goes quiet or disappears.

pub mod config;
pub mod controller;
pub mod drive;
pub mod error;
pub mod hardware;
pub mod supervisor;
pub mod telemetry;
