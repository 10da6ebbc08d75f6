//! In-memory motor outputs.
//!
//! Used when no driver board is attached and by the test suites. Every write
//! is recorded behind a shared handle so callers can inspect what a motor
//! would have put on the wire.

use std::sync::{Arc, Mutex};
use tracing::trace;

use super::HardwareOutput;
use crate::error::{Result, RoverError};

/// What a simulated output has seen so far
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSnapshot {
    /// Last forward duty written (percent)
    pub forward: f32,
    /// Last reverse duty written (percent)
    pub reverse: f32,
    /// Number of successful channel writes
    pub writes: usize,
    /// Set by `release()`
    pub released: bool,
    /// Set if both channels were ever non-zero at the same time
    pub overlap_seen: bool,
}

impl OutputSnapshot {
    /// Signed speed implied by the channels: forward positive, reverse negative.
    pub fn signed_speed(&self) -> f32 {
        self.forward - self.reverse
    }
}

#[derive(Debug, Default)]
struct Shared {
    snapshot: OutputSnapshot,
    fail_writes: bool,
}

/// Cloneable view onto a [`SimulatedOutput`]
#[derive(Debug, Clone, Default)]
pub struct SimulatedOutputHandle {
    shared: Arc<Mutex<Shared>>,
}

impl SimulatedOutputHandle {
    /// Current channel state
    pub fn snapshot(&self) -> OutputSnapshot {
        self.lock().snapshot.clone()
    }

    /// Make every subsequent write (and release) fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Recording [`HardwareOutput`] implementation
#[derive(Debug)]
pub struct SimulatedOutput {
    name: String,
    handle: SimulatedOutputHandle,
}

impl SimulatedOutput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: SimulatedOutputHandle::default(),
        }
    }

    /// Handle for inspecting this output after it has been moved into a motor
    pub fn handle(&self) -> SimulatedOutputHandle {
        self.handle.clone()
    }

    fn write(&mut self, forward: Option<f32>, reverse: Option<f32>) -> Result<()> {
        let mut shared = self.handle.lock();
        if shared.fail_writes {
            return Err(RoverError::hardware(&self.name, "simulated write failure"));
        }

        let snapshot = &mut shared.snapshot;
        if let Some(duty) = forward {
            snapshot.forward = duty;
        }
        if let Some(duty) = reverse {
            snapshot.reverse = duty;
        }
        snapshot.writes += 1;
        if snapshot.forward > 0.0 && snapshot.reverse > 0.0 {
            snapshot.overlap_seen = true;
        }

        trace!(
            "{}: forward={:.1}% reverse={:.1}%",
            self.name,
            snapshot.forward,
            snapshot.reverse
        );
        Ok(())
    }
}

impl HardwareOutput for SimulatedOutput {
    fn write_forward(&mut self, duty: f32) -> Result<()> {
        self.write(Some(duty), None)
    }

    fn write_reverse(&mut self, duty: f32) -> Result<()> {
        self.write(None, Some(duty))
    }

    fn release(&mut self) -> Result<()> {
        let mut shared = self.handle.lock();
        if shared.fail_writes {
            return Err(RoverError::hardware(&self.name, "simulated release failure"));
        }
        shared.snapshot.forward = 0.0;
        shared.snapshot.reverse = 0.0;
        shared.snapshot.released = true;
        trace!("{}: released", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_writes() {
        let mut output = SimulatedOutput::new("Front Left");
        let handle = output.handle();

        output.write_reverse(0.0).unwrap();
        output.write_forward(42.5).unwrap();

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.forward, 42.5);
        assert_eq!(snapshot.reverse, 0.0);
        assert_eq!(snapshot.writes, 2);
        assert_eq!(snapshot.signed_speed(), 42.5);
        assert!(!snapshot.overlap_seen);
    }

    #[test]
    fn test_detects_channel_overlap() {
        let mut output = SimulatedOutput::new("Actuator");
        let handle = output.handle();

        output.write_forward(10.0).unwrap();
        output.write_reverse(10.0).unwrap();

        assert!(handle.snapshot().overlap_seen);
    }

    #[test]
    fn test_failure_injection() {
        let mut output = SimulatedOutput::new("Rear Right");
        let handle = output.handle();
        handle.set_fail_writes(true);

        match output.write_forward(50.0) {
            Err(RoverError::Hardware { motor, .. }) => assert_eq!(motor, "Rear Right"),
            other => panic!("Expected Hardware error, got: {:?}", other),
        }
        assert!(output.release().is_err());
        assert_eq!(handle.snapshot().writes, 0);
    }

    #[test]
    fn test_release_zeroes_channels() {
        let mut output = SimulatedOutput::new("Rear Left");
        let handle = output.handle();

        output.write_forward(80.0).unwrap();
        output.release().unwrap();

        let snapshot = handle.snapshot();
        assert!(snapshot.released);
        assert_eq!(snapshot.signed_speed(), 0.0);
    }
}
