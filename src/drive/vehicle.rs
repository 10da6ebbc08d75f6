//! # Vehicle Module
//!
//! Four wheel motors, the tongue actuator, a steering mixer and a speed limit.
//!
//! The left pair always receives the mixer's left value and the right pair
//! the right value. [`Vehicle::update`] must run every control tick whether
//! or not [`Vehicle::drive`] was called, so ramps keep converging.
//!
//! Hardware failures on one motor never stop the others: every bulk
//! operation visits all five motors and reports the first error afterwards.

use tokio::time::Instant;
use tracing::{info, warn};

use super::motor::Motor;
use super::steering::{SteeringMixer, SPEED_RANGE};
use crate::config::DriveConfig;
use crate::error::Result;
use crate::hardware::{MotorChannel, MotorOutputs};

/// Drive train plus actuator
#[derive(Debug)]
pub struct Vehicle {
    front_left: Motor,
    front_right: Motor,
    rear_left: Motor,
    rear_right: Motor,
    actuator: Motor,
    mixer: SteeringMixer,
    max_speed_percent: i32,
    released: bool,
}

/// Keep going through every motor, remember the first failure
fn first_error(results: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    let mut first = None;
    for result in results {
        if let Err(e) = result {
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}

impl Vehicle {
    /// Build a vehicle from five outputs in [`MotorChannel::ALL`] order.
    pub fn new(
        outputs: MotorOutputs,
        mixer: SteeringMixer,
        drive_acceleration: f32,
        actuator_acceleration: f32,
    ) -> Self {
        let [front_left, front_right, rear_left, rear_right, actuator] = outputs;
        let wheel = |channel: MotorChannel, output| Motor::new(channel.name(), output, drive_acceleration);

        Self {
            front_left: wheel(MotorChannel::FrontLeft, front_left),
            front_right: wheel(MotorChannel::FrontRight, front_right),
            rear_left: wheel(MotorChannel::RearLeft, rear_left),
            rear_right: wheel(MotorChannel::RearRight, rear_right),
            actuator: Motor::new(MotorChannel::Actuator.name(), actuator, actuator_acceleration),
            mixer,
            max_speed_percent: SPEED_RANGE,
            released: false,
        }
    }

    /// Build a vehicle with mixer, speed limit and ramp rates from configuration.
    pub fn from_config(outputs: MotorOutputs, config: &DriveConfig) -> Self {
        let mut vehicle = Self::new(
            outputs,
            SteeringMixer::from_config(config),
            config.drive_acceleration,
            config.actuator_acceleration,
        );
        vehicle.set_max_speed(config.max_speed_percent);
        info!(
            "Vehicle ready: {:?} steering, max speed {}%",
            vehicle.mixer, vehicle.max_speed_percent
        );
        vehicle
    }

    fn wheels_mut(&mut self) -> [&mut Motor; 4] {
        [
            &mut self.front_left,
            &mut self.front_right,
            &mut self.rear_left,
            &mut self.rear_right,
        ]
    }

    fn motors_mut(&mut self) -> [&mut Motor; 5] {
        [
            &mut self.front_left,
            &mut self.front_right,
            &mut self.rear_left,
            &mut self.rear_right,
            &mut self.actuator,
        ]
    }

    /// Motor at the given position
    pub fn motor(&self, channel: MotorChannel) -> &Motor {
        match channel {
            MotorChannel::FrontLeft => &self.front_left,
            MotorChannel::FrontRight => &self.front_right,
            MotorChannel::RearLeft => &self.rear_left,
            MotorChannel::RearRight => &self.rear_right,
            MotorChannel::Actuator => &self.actuator,
        }
    }

    /// Current wheel speeds: front-left, front-right, rear-left, rear-right
    pub fn wheel_speeds(&self) -> [f32; 4] {
        [
            self.front_left.current_speed(),
            self.front_right.current_speed(),
            self.rear_left.current_speed(),
            self.rear_right.current_speed(),
        ]
    }

    pub fn actuator_speed(&self) -> f32 {
        self.actuator.current_speed()
    }

    pub fn mixer(&self) -> SteeringMixer {
        self.mixer
    }

    pub fn max_speed_percent(&self) -> i32 {
        self.max_speed_percent
    }

    /// Mix `(turn, forward)` into ramp targets for all four wheels.
    ///
    /// `forward` is scaled by the speed limit before mixing; turn is not, so
    /// pivots keep full authority. Returns the `(left, right)` targets.
    pub fn drive(&mut self, turn: i32, forward: i32) -> (i32, i32) {
        let scaled = (forward as f32 * self.max_speed_percent as f32 / SPEED_RANGE as f32).round() as i32;
        let (left, right) = self.mixer.compute(turn, scaled);

        self.front_left.set_speed(left);
        self.rear_left.set_speed(left);
        self.front_right.set_speed(right);
        self.rear_right.set_speed(right);
        (left, right)
    }

    /// Advance every ramp to now
    pub fn update(&mut self) -> Result<()> {
        self.update_at(Instant::now())
    }

    /// Advance every ramp to `now`
    pub fn update_at(&mut self, now: Instant) -> Result<()> {
        first_error(self.motors_mut().map(|motor| motor.update_at(now)))
    }

    /// Raise the tongue (actuator runs in its negative direction)
    pub fn raise_tongue(&mut self, speed: i32) {
        self.actuator.set_speed(-speed.clamp(0, SPEED_RANGE));
    }

    /// Lower the tongue (actuator runs in its positive direction)
    pub fn lower_tongue(&mut self, speed: i32) {
        self.actuator.set_speed(speed.clamp(0, SPEED_RANGE));
    }

    /// Ramp the actuator to a stop
    pub fn stop_actuator(&mut self) {
        self.actuator.stop();
    }

    /// Ramp the wheels to a stop, leaving the actuator alone
    pub fn stop_wheels(&mut self) {
        for wheel in self.wheels_mut() {
            wheel.stop();
        }
    }

    /// Zero the four wheels immediately, leaving the actuator alone.
    pub fn stop_wheels_now(&mut self) -> Result<()> {
        let result = first_error(self.wheels_mut().map(Motor::emergency_stop));
        if let Err(e) = &result {
            warn!("Wheel stop incomplete: {}", e);
        }
        result
    }

    /// Emergency stop: zero every motor immediately, bypassing the ramps.
    ///
    /// All five motors are attempted even if some fail.
    pub fn stop_all(&mut self) -> Result<()> {
        let result = first_error(self.motors_mut().map(Motor::emergency_stop));
        if let Err(e) = &result {
            warn!("Emergency stop incomplete: {}", e);
        }
        result
    }

    /// Set the forward speed limit, clamped to `0..=100`
    pub fn set_max_speed(&mut self, percent: i32) {
        self.max_speed_percent = percent.clamp(0, SPEED_RANGE);
        info!("Max speed set to {}%", self.max_speed_percent);
    }

    pub fn set_drive_acceleration(&mut self, rate: f32) {
        for wheel in self.wheels_mut() {
            wheel.set_acceleration(rate);
        }
    }

    pub fn set_actuator_acceleration(&mut self, rate: f32) {
        self.actuator.set_acceleration(rate);
    }

    /// Emergency stop, then release every output. Runs once; later calls are no-ops.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let stopped = self.stop_all();
        let released = first_error(self.motors_mut().map(Motor::release));
        if let Err(e) = &released {
            warn!("Output release incomplete: {}", e);
        }
        info!("Motor outputs released");
        stopped.and(released)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for Vehicle {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.release() {
                warn!("Release on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::hardware::{HardwareOutput, SimulatedOutput, SimulatedOutputHandle};
    use std::time::Duration;

    /// Vehicle on simulated outputs plus a handle per motor
    pub(crate) fn simulated_vehicle() -> (Vehicle, [SimulatedOutputHandle; 5]) {
        let outputs = MotorChannel::ALL.map(|channel| SimulatedOutput::new(channel.name()));
        let handles = [
            outputs[0].handle(),
            outputs[1].handle(),
            outputs[2].handle(),
            outputs[3].handle(),
            outputs[4].handle(),
        ];
        let outputs = outputs.map(|output| Box::new(output) as Box<dyn HardwareOutput>);
        (Vehicle::new(outputs, SteeringMixer::default(), 400.0, 400.0), handles)
    }

    fn settle(vehicle: &mut Vehicle) -> Instant {
        let mut t = Instant::now();
        for _ in 0..40 {
            t += Duration::from_millis(50);
            vehicle.update_at(t).unwrap();
        }
        t
    }

    #[test]
    fn test_drive_sets_targets_not_outputs() {
        let (mut vehicle, handles) = simulated_vehicle();

        assert_eq!(vehicle.drive(0, 100), (100, 100));

        assert_eq!(vehicle.motor(MotorChannel::FrontLeft).target_speed(), 100.0);
        assert_eq!(vehicle.motor(MotorChannel::RearRight).target_speed(), 100.0);
        assert_eq!(vehicle.wheel_speeds(), [0.0; 4]);
        assert_eq!(handles[0].snapshot().writes, 0);
    }

    #[test]
    fn test_drive_assigns_sides() {
        let (mut vehicle, _) = simulated_vehicle();

        vehicle.drive(100, 0);

        assert_eq!(vehicle.motor(MotorChannel::FrontLeft).target_speed(), 100.0);
        assert_eq!(vehicle.motor(MotorChannel::RearLeft).target_speed(), 100.0);
        assert_eq!(vehicle.motor(MotorChannel::FrontRight).target_speed(), -100.0);
        assert_eq!(vehicle.motor(MotorChannel::RearRight).target_speed(), -100.0);
        assert_eq!(vehicle.motor(MotorChannel::Actuator).target_speed(), 0.0);
    }

    #[test]
    fn test_speed_limit_scales_forward_only() {
        let (mut vehicle, _) = simulated_vehicle();
        vehicle.set_max_speed(50);

        assert_eq!(vehicle.drive(0, 100), (50, 50));
        // Pivot keeps full authority
        assert_eq!(vehicle.drive(100, 0), (100, -100));
    }

    #[test]
    fn test_set_max_speed_clamps() {
        let (mut vehicle, _) = simulated_vehicle();
        vehicle.set_max_speed(150);
        assert_eq!(vehicle.max_speed_percent(), 100);
        vehicle.set_max_speed(-10);
        assert_eq!(vehicle.max_speed_percent(), 0);
    }

    #[test]
    fn test_update_converges_all_motors() {
        let (mut vehicle, handles) = simulated_vehicle();
        vehicle.drive(0, 100);
        vehicle.lower_tongue(60);

        settle(&mut vehicle);

        assert_eq!(vehicle.wheel_speeds(), [100.0; 4]);
        assert_eq!(vehicle.actuator_speed(), 60.0);
        assert_eq!(handles[4].snapshot().forward, 60.0);
    }

    #[test]
    fn test_tongue_directions() {
        let (mut vehicle, _) = simulated_vehicle();

        vehicle.raise_tongue(100);
        assert_eq!(vehicle.motor(MotorChannel::Actuator).target_speed(), -100.0);

        vehicle.lower_tongue(100);
        assert_eq!(vehicle.motor(MotorChannel::Actuator).target_speed(), 100.0);

        vehicle.stop_actuator();
        assert_eq!(vehicle.motor(MotorChannel::Actuator).target_speed(), 0.0);
    }

    #[test]
    fn test_stop_all_is_instant_on_every_motor() {
        let (mut vehicle, handles) = simulated_vehicle();
        vehicle.drive(0, 100);
        vehicle.raise_tongue(100);
        settle(&mut vehicle);

        vehicle.stop_all().unwrap();

        for channel in MotorChannel::ALL {
            let motor = vehicle.motor(channel);
            assert_eq!(motor.current_speed(), 0.0, "{}", channel);
            assert_eq!(motor.target_speed(), 0.0, "{}", channel);
        }
        for handle in &handles {
            assert_eq!(handle.snapshot().signed_speed(), 0.0);
        }
    }

    #[test]
    fn test_stop_all_continues_past_failed_motor() {
        let (mut vehicle, handles) = simulated_vehicle();
        vehicle.drive(0, 100);
        settle(&mut vehicle);
        handles[0].set_fail_writes(true);

        assert!(vehicle.stop_all().is_err());

        for handle in &handles[1..] {
            assert_eq!(handle.snapshot().signed_speed(), 0.0);
        }
    }

    #[test]
    fn test_stop_wheels_leaves_actuator() {
        let (mut vehicle, _) = simulated_vehicle();
        vehicle.drive(0, 100);
        vehicle.lower_tongue(50);

        vehicle.stop_wheels();

        assert_eq!(vehicle.motor(MotorChannel::FrontLeft).target_speed(), 0.0);
        assert_eq!(vehicle.motor(MotorChannel::Actuator).target_speed(), 50.0);
    }

    #[test]
    fn test_stop_wheels_now_keeps_actuator_moving() {
        let (mut vehicle, handles) = simulated_vehicle();
        vehicle.drive(0, 100);
        vehicle.raise_tongue(100);
        settle(&mut vehicle);

        vehicle.stop_wheels_now().unwrap();

        assert_eq!(vehicle.wheel_speeds(), [0.0; 4]);
        for handle in &handles[..4] {
            assert_eq!(handle.snapshot().signed_speed(), 0.0);
        }
        assert_eq!(vehicle.actuator_speed(), -100.0);
        assert_eq!(vehicle.motor(MotorChannel::Actuator).target_speed(), -100.0);
        assert_eq!(handles[4].snapshot().signed_speed(), -100.0);
    }

    #[test]
    fn test_acceleration_propagates() {
        let (mut vehicle, _) = simulated_vehicle();

        vehicle.set_drive_acceleration(100.0);
        vehicle.set_actuator_acceleration(-3.0);

        for channel in &MotorChannel::ALL[..4] {
            assert_eq!(vehicle.motor(*channel).acceleration(), 100.0);
        }
        assert_eq!(vehicle.motor(MotorChannel::Actuator).acceleration(), 1.0);
    }

    #[test]
    fn test_release_stops_and_releases_once() {
        let (mut vehicle, handles) = simulated_vehicle();
        vehicle.drive(0, 100);
        settle(&mut vehicle);

        vehicle.release().unwrap();
        assert!(vehicle.is_released());
        for handle in &handles {
            let snapshot = handle.snapshot();
            assert!(snapshot.released);
            assert_eq!(snapshot.signed_speed(), 0.0);
        }

        let writes = handles[0].snapshot().writes;
        vehicle.release().unwrap();
        assert_eq!(handles[0].snapshot().writes, writes);
    }

    #[test]
    fn test_release_continues_past_failed_motor() {
        let (mut vehicle, handles) = simulated_vehicle();
        handles[2].set_fail_writes(true);

        assert!(vehicle.release().is_err());
        assert!(handles[0].snapshot().released);
        assert!(handles[4].snapshot().released);
        assert!(!handles[2].snapshot().released);
    }

    #[test]
    fn test_drop_releases_outputs() {
        let (mut vehicle, handles) = simulated_vehicle();
        vehicle.drive(0, 100);
        settle(&mut vehicle);

        drop(vehicle);

        for handle in &handles {
            assert!(handle.snapshot().released);
        }
    }

    #[test]
    fn test_from_config() {
        let mut config = DriveConfig::default();
        config.max_speed_percent = 70;
        config.steering = crate::config::SteeringMode::FourDirection;
        config.drive_acceleration = 250.0;

        let outputs = MotorChannel::ALL
            .map(|channel| Box::new(SimulatedOutput::new(channel.name())) as Box<dyn HardwareOutput>);
        let vehicle = Vehicle::from_config(outputs, &config);

        assert_eq!(vehicle.max_speed_percent(), 70);
        assert_eq!(vehicle.mixer(), SteeringMixer::FourDirection);
        assert_eq!(vehicle.motor(MotorChannel::RearLeft).acceleration(), 250.0);
        assert_eq!(vehicle.motor(MotorChannel::Actuator).acceleration(), 400.0);
    }
}
