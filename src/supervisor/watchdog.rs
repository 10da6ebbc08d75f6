//! Stale-input watchdog.
//!
//! Tracks when the controller last produced an event. Once the gap exceeds
//! the timeout the input is considered stale and the vehicle must not act
//! on the remembered stick position.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Health of the command stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputHealth {
    Live,
    Stale,
}

/// Command timeout tracker
#[derive(Debug, Clone)]
pub struct ConnectionSupervisor {
    timeout: Duration,
    last_command: Instant,
    health: InputHealth,
}

impl ConnectionSupervisor {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_command: now,
            health: InputHealth::Live,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn last_command(&self) -> Instant {
        self.last_command
    }

    pub fn health(&self) -> InputHealth {
        self.health
    }

    /// Record that input arrived at `now`
    pub fn refresh(&mut self, now: Instant) {
        self.last_command = now;
    }

    /// Strictly greater than the timeout; exactly at the limit is still live
    pub fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_command) > self.timeout
    }

    /// Re-evaluate health, logging once per transition.
    pub fn check(&mut self, now: Instant) -> InputHealth {
        let next = if self.is_stale(now) {
            InputHealth::Stale
        } else {
            InputHealth::Live
        };

        if next != self.health {
            match next {
                InputHealth::Stale => warn!(
                    "No controller input for {:?}, stopping vehicle",
                    now.saturating_duration_since(self.last_command)
                ),
                InputHealth::Live => info!("Controller input resumed"),
            }
            self.health = next;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(1500);

    #[test]
    fn test_fresh_supervisor_is_live() {
        let now = Instant::now();
        let mut watchdog = ConnectionSupervisor::new(TIMEOUT, now);
        assert_eq!(watchdog.check(now), InputHealth::Live);
        assert_eq!(watchdog.timeout(), TIMEOUT);
    }

    #[test]
    fn test_exact_timeout_is_not_stale() {
        let start = Instant::now();
        let watchdog = ConnectionSupervisor::new(TIMEOUT, start);
        assert!(!watchdog.is_stale(start + TIMEOUT));
        assert!(watchdog.is_stale(start + TIMEOUT + Duration::from_millis(1)));
    }

    #[test]
    fn test_goes_stale_and_recovers() {
        let start = Instant::now();
        let mut watchdog = ConnectionSupervisor::new(TIMEOUT, start);

        let late = start + Duration::from_millis(1600);
        assert_eq!(watchdog.check(late), InputHealth::Stale);
        assert_eq!(watchdog.health(), InputHealth::Stale);

        watchdog.refresh(late);
        assert_eq!(watchdog.last_command(), late);
        assert_eq!(watchdog.check(late), InputHealth::Live);
    }

    #[test]
    fn test_stays_stale_until_refreshed() {
        let start = Instant::now();
        let mut watchdog = ConnectionSupervisor::new(TIMEOUT, start);

        for ms in [1600, 2000, 5000] {
            assert_eq!(
                watchdog.check(start + Duration::from_millis(ms)),
                InputHealth::Stale
            );
        }
    }

    #[test]
    fn test_clock_before_last_command_is_live() {
        let start = Instant::now() + Duration::from_secs(10);
        let watchdog = ConnectionSupervisor::new(TIMEOUT, start);
        assert!(!watchdog.is_stale(start - Duration::from_secs(5)));
    }
}
