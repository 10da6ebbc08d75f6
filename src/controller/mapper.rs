//! # Controller Input Mapper Module
//!
//! Folds raw evdev events from the Joy-Con (R) into a [`ControllerState`]
//! and derives the drive and tongue commands from it.
//!
//! ## Axis Codes (EV_ABS)
//!
//! | Input | evdev Code | Meaning |
//! |-------|------------|---------|
//! | Stick X | ABS_RX | Turn (right positive) |
//! | Stick Y | ABS_RY | Forward (inverted: up positive) |
//!
//! ## Button Codes (EV_KEY)
//!
//! | Button | evdev Code | Action |
//! |--------|------------|--------|
//! | X | BTN_NORTH | Raise tongue (held) |
//! | B | BTN_SOUTH | Lower tongue (held) |
//! | Y | BTN_WEST | Reserved |
//! | A | BTN_EAST | Reserved |
//!
//! Key value 1 is press, 0 is release. Autorepeat (value 2) carries no new
//! information and leaves the state alone.
//!
//! ## Usage
//!
//! ```
//! use evdev::{AbsoluteAxisType, EventType, InputEvent};
//! use hitch_rover::controller::mapper::EventMapper;
//!
//! let mut mapper = EventMapper::new(10);
//! let up = InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_RY.0, 0);
//! assert!(mapper.process_events(&[up]));
//! assert_eq!(mapper.drive_values(), (0, 100));
//! ```

use evdev::{AbsoluteAxisType, InputEvent, InputEventKind, Key};

use super::calibration::{AxisRange, StickCalibration};

const KEY_RELEASED: i32 = 0;
const KEY_PRESSED: i32 = 1;

/// Normalized stick position, both axes in `-100..=100`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoystickState {
    /// Turn: negative left, positive right
    pub x: i32,
    /// Forward: negative back, positive forward
    pub y: i32,
}

impl JoystickState {
    #[must_use]
    pub fn is_centered(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

/// Held state of the face buttons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    /// BTN_NORTH
    pub raise: bool,
    /// BTN_SOUTH
    pub lower: bool,
    /// BTN_WEST, reserved
    pub left: bool,
    /// BTN_EAST, reserved
    pub right: bool,
}

impl ButtonState {
    #[must_use]
    pub fn any_pressed(&self) -> bool {
        self.raise || self.lower || self.left || self.right
    }

    /// Tongue command for the held buttons. Raise wins when both are held.
    #[must_use]
    pub fn actuator_command(&self) -> ActuatorCommand {
        if self.raise {
            ActuatorCommand::Raise
        } else if self.lower {
            ActuatorCommand::Lower
        } else {
            ActuatorCommand::Stop
        }
    }
}

/// What the tongue actuator should do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    Raise,
    Lower,
    Stop,
}

/// Everything the operator is currently asking for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub joystick: JoystickState,
    pub buttons: ButtonState,
}

/// Converts evdev events into [`ControllerState`].
///
/// Axis values are normalized as they arrive, so the state always holds
/// percentages with the dead zone applied.
#[derive(Debug)]
pub struct EventMapper {
    state: ControllerState,
    calibration: StickCalibration,
}

impl Default for EventMapper {
    fn default() -> Self {
        Self::new(10)
    }
}

impl EventMapper {
    /// Creates a mapper with a centred stick and released buttons.
    ///
    /// # Arguments
    ///
    /// * `dead_zone` - Stick dead zone in percent
    #[must_use]
    pub fn new(dead_zone: i32) -> Self {
        Self {
            state: ControllerState::default(),
            calibration: StickCalibration::new(dead_zone),
        }
    }

    #[must_use]
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    #[must_use]
    pub fn calibration(&self) -> &StickCalibration {
        &self.calibration
    }

    /// Use the raw range reported by a newly connected device
    pub fn set_stick_range(&mut self, range: AxisRange) {
        self.calibration.set_range(range);
    }

    /// `(turn, forward)` for the steering mixer
    #[must_use]
    pub fn drive_values(&self) -> (i32, i32) {
        (self.state.joystick.x, self.state.joystick.y)
    }

    #[must_use]
    pub fn actuator_command(&self) -> ActuatorCommand {
        self.state.buttons.actuator_command()
    }

    /// Apply one event. Sync reports and unmapped codes are ignored.
    pub fn process_event(&mut self, event: &InputEvent) {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => self.process_axis_event(axis, event.value()),
            InputEventKind::Key(key) => match event.value() {
                KEY_PRESSED => self.process_key_event(key, true),
                KEY_RELEASED => self.process_key_event(key, false),
                _ => {}
            },
            _ => {}
        }
    }

    /// Apply a batch of events in order.
    ///
    /// Returns `true` if the batch was non-empty. Any event counts, including
    /// sync reports, since it proves the device is still talking.
    pub fn process_events<'a, I>(&mut self, events: I) -> bool
    where
        I: IntoIterator<Item = &'a InputEvent>,
    {
        let mut received = false;
        for event in events {
            self.process_event(event);
            received = true;
        }
        received
    }

    fn process_axis_event(&mut self, axis: AbsoluteAxisType, value: i32) {
        match axis {
            AbsoluteAxisType::ABS_RX => self.state.joystick.x = self.calibration.turn.apply(value),
            AbsoluteAxisType::ABS_RY => self.state.joystick.y = self.calibration.forward.apply(value),
            _ => {}
        }
    }

    fn process_key_event(&mut self, key: Key, pressed: bool) {
        match key {
            Key::BTN_NORTH => self.state.buttons.raise = pressed,
            Key::BTN_SOUTH => self.state.buttons.lower = pressed,
            Key::BTN_WEST => self.state.buttons.left = pressed,
            Key::BTN_EAST => self.state.buttons.right = pressed,
            _ => {}
        }
    }

    /// Centre the stick and release every button.
    ///
    /// Called on reconnect so a button held while the link dropped cannot
    /// keep the tongue moving.
    pub fn reset(&mut self) {
        self.state = ControllerState::default();
    }
}
