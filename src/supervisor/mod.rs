//! # Supervisor Module
//!
//! The control loop state machine tying controller input to the vehicle.
//!
//! ## States
//!
//! ```text
//! Connecting ──connected──▶ Ready ──source lost──▶ Disconnected ──▶ Connecting
//!      └──────────────── shutdown (from any state) ──▶ ShuttingDown
//! ```
//!
//! ## Tick (Ready)
//!
//! 1. Source gone: emergency stop, back to connecting
//! 2. Drain pending events without blocking
//! 3. Advance every motor ramp
//! 4. Fold events into stick/button state; any event refreshes the watchdog
//! 5. Stale input: zero the wheels. Otherwise drive from the stick
//! 6. Raise, lower or stop the tongue from the buttons
//!
//! The tick itself is synchronous, so shutdown is only ever observed between
//! ticks and always runs the stop-then-release sequence.

pub mod watchdog;

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::controller::{ActuatorCommand, EventMapper, InputConnector, InputSource};
use crate::drive::Vehicle;
use crate::error::{Result, RoverError};
use crate::telemetry::{TelemetryLogger, TelemetryRecord};
use watchdog::{ConnectionSupervisor, InputHealth};

/// Control loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Connecting,
    Ready,
    Disconnected,
    ShuttingDown,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::ShuttingDown => "shutting down",
        };
        f.write_str(name)
    }
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The source is gone; reconnect before ticking again
    Disconnected,
}

/// Timing and command constants for the loop
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSettings {
    pub tick_period: Duration,
    pub command_timeout: Duration,
    pub reconnect_interval: Duration,
    /// Tongue speed while a button is held
    pub actuator_speed: i32,
    pub dead_zone: i32,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ControlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_period: Duration::from_secs_f64(1.0 / f64::from(config.safety.loop_rate_hz.max(1))),
            command_timeout: Duration::from_millis(config.safety.command_timeout_ms),
            reconnect_interval: Duration::from_millis(config.controller.reconnect_interval_ms),
            actuator_speed: config.drive.actuator_speed,
            dead_zone: config.controller.dead_zone,
        }
    }
}

/// Supervisor owning the vehicle and the controller connector
pub struct ControlLoop<C: InputConnector> {
    vehicle: Vehicle,
    connector: C,
    mapper: EventMapper,
    watchdog: ConnectionSupervisor,
    settings: ControlSettings,
    state: LoopState,
    targets: (i32, i32),
    telemetry: Option<TelemetryLogger>,
}

impl<C: InputConnector> ControlLoop<C> {
    pub fn new(vehicle: Vehicle, connector: C, settings: ControlSettings) -> Self {
        Self {
            vehicle,
            connector,
            mapper: EventMapper::new(settings.dead_zone),
            watchdog: ConnectionSupervisor::new(settings.command_timeout, Instant::now()),
            settings,
            state: LoopState::Connecting,
            targets: (0, 0),
            telemetry: None,
        }
    }

    /// Record a telemetry line per tick (throttled by the logger)
    pub fn with_telemetry(mut self, logger: TelemetryLogger) -> Self {
        self.telemetry = Some(logger);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    pub fn mapper(&self) -> &EventMapper {
        &self.mapper
    }

    /// Last `(left, right)` wheel targets
    pub fn targets(&self) -> (i32, i32) {
        self.targets
    }

    fn set_state(&mut self, next: LoopState) {
        if next != self.state {
            info!("Control loop: {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// One discovery attempt. On success the loop is `Ready` with fresh
    /// controller state.
    pub fn connect(&mut self, now: Instant) -> Option<Box<dyn InputSource>> {
        self.set_state(LoopState::Connecting);

        match self.connector.connect() {
            Ok(source) => {
                info!("Controller connected: {}", source.describe());
                self.mapper.reset();
                self.mapper.set_stick_range(source.stick_range());
                self.watchdog = ConnectionSupervisor::new(self.settings.command_timeout, now);
                self.set_state(LoopState::Ready);
                Some(source)
            }
            Err(RoverError::ControllerNotFound(name)) => {
                info!(
                    "Waiting for controller {:?}, retrying in {:?}",
                    name, self.settings.reconnect_interval
                );
                None
            }
            Err(e) => {
                warn!(
                    "Controller connection failed: {}, retrying in {:?}",
                    e, self.settings.reconnect_interval
                );
                None
            }
        }
    }

    /// Run one control tick at `now`.
    pub fn tick(&mut self, source: &mut dyn InputSource, now: Instant) -> TickOutcome {
        if !source.is_connected() {
            return self.disconnect();
        }

        let events = match source.poll() {
            Ok(events) => events,
            Err(e) => {
                warn!("Controller read failed: {}", e);
                if matches!(e, RoverError::ControllerDisconnected) || !source.is_connected() {
                    return self.disconnect();
                }
                Vec::new()
            }
        };

        // Faulted motors already logged their failure
        let _ = self.vehicle.update_at(now);

        if self.mapper.process_events(&events) {
            self.watchdog.refresh(now);
        }
        let (turn, forward) = self.mapper.drive_values();

        let was_stale = self.watchdog.health() == InputHealth::Stale;
        let stale = self.watchdog.check(now) == InputHealth::Stale;
        if stale {
            if !was_stale {
                // Failures are logged by the vehicle; later ticks only hold zero
                let _ = self.vehicle.stop_wheels_now();
            }
            self.vehicle.stop_wheels();
            self.targets = (0, 0);
        } else {
            self.targets = self.vehicle.drive(turn, forward);
        }
        // A held button produces no events, so the tongue follows it even when stale
        self.apply_actuator(self.mapper.actuator_command());

        self.record_telemetry(now, turn, forward, stale);
        TickOutcome::Continue
    }

    fn apply_actuator(&mut self, command: ActuatorCommand) {
        match command {
            ActuatorCommand::Raise => self.vehicle.raise_tongue(self.settings.actuator_speed),
            ActuatorCommand::Lower => self.vehicle.lower_tongue(self.settings.actuator_speed),
            ActuatorCommand::Stop => self.vehicle.stop_actuator(),
        }
    }

    fn disconnect(&mut self) -> TickOutcome {
        warn!("Controller disconnected, emergency stop");
        self.set_state(LoopState::Disconnected);
        if let Err(e) = self.vehicle.stop_all() {
            error!("Emergency stop after disconnect incomplete: {}", e);
        }
        self.mapper.reset();
        self.targets = (0, 0);
        TickOutcome::Disconnected
    }

    fn record_telemetry(&mut self, now: Instant, turn: i32, forward: i32, stale: bool) {
        let Some(logger) = self.telemetry.as_mut() else {
            return;
        };
        if !logger.is_due(now) {
            return;
        }

        let mut record = TelemetryRecord::now(self.state);
        record.turn = turn;
        record.forward = forward;
        (record.left_target, record.right_target) = self.targets;
        record.wheel_speeds = self.vehicle.wheel_speeds();
        record.actuator_speed = self.vehicle.actuator_speed();
        record.stale = stale;

        if let Err(e) = logger.record(now, &record) {
            warn!("Telemetry write failed, disabling telemetry: {}", e);
            self.telemetry = None;
        }
    }

    /// Emergency stop, then release every output.
    pub fn shutdown(&mut self) -> Result<()> {
        self.set_state(LoopState::ShuttingDown);
        info!("Stopping all motors");

        // Release zeroes every motor before handing the outputs back
        let released = self.vehicle.release();
        if let Some(logger) = self.telemetry.as_mut() {
            if let Err(e) = logger.flush() {
                warn!("Telemetry flush failed: {}", e);
            }
        }

        info!("Shutdown complete");
        released
    }

    /// Drive the loop until `shutdown` resolves.
    ///
    /// Reconnects forever at the configured interval. Returns the outcome of
    /// the final stop-and-release.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "Control loop running at {:?} per tick, input timeout {:?}",
            self.settings.tick_period, self.settings.command_timeout
        );

        // Only the very first attempt goes without a delay
        let mut backoff = false;
        loop {
            let mut source = loop {
                if backoff {
                    tokio::select! {
                        _ = &mut shutdown => return self.shutdown(),
                        _ = time::sleep(self.settings.reconnect_interval) => {}
                    }
                }
                backoff = true;
                if let Some(source) = self.connect(Instant::now()) {
                    break source;
                }
            };

            let mut ticker = time::interval(self.settings.tick_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let outcome = tokio::select! {
                    biased;
                    _ = &mut shutdown => None,
                    _ = ticker.tick() => Some(self.tick(source.as_mut(), Instant::now())),
                };

                match outcome {
                    None => return self.shutdown(),
                    Some(TickOutcome::Disconnected) => break,
                    Some(TickOutcome::Continue) => {}
                }
            }
        }
    }
}
