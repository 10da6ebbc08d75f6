//! # Joy-Con Controller Module
//!
//! Discovers the right-hand Joy-Con through the Linux evdev interface and
//! reads its events without blocking the control loop.
//!
//! ## Controller Detection
//!
//! Bluetooth Joy-Cons paired through the `hid-nintendo` driver appear as
//! several input nodes (buttons/sticks, IMU). The control node is matched by
//! device name, case-insensitively, so "Joy-Con (R)" does not also pick up
//! "Joy-Con (R) (IMU)".
//!
//! ## Non-blocking reads
//!
//! The file descriptor is switched to `O_NONBLOCK`; an empty queue surfaces
//! as `WouldBlock` and is reported as "no events". `ENODEV` means the
//! controller went away.

use evdev::{AbsoluteAxisType, Device, InputEvent};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::calibration::AxisRange;
use super::source::{InputConnector, InputSource};
use crate::error::{Result, RoverError};

/// Default evdev name of the right Joy-Con
pub const DEFAULT_DEVICE_NAME: &str = "Joy-Con (R)";

/// Where evdev nodes live
pub const INPUT_DIR: &str = "/dev/input";

/// Open handle on a Joy-Con (or any evdev device with a matching name)
pub struct JoyConController {
    device: Device,
    device_path: PathBuf,
    stick_range: AxisRange,
    connected: bool,
}

impl std::fmt::Debug for JoyConController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoyConController")
            .field("device_path", &self.device_path)
            .field("name", &self.device.name())
            .field("stick_range", &self.stick_range)
            .field("connected", &self.connected)
            .finish()
    }
}

impl JoyConController {
    /// Find and open the first device under `/dev/input` whose name matches.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: no readable device has that name
    /// - `Controller`: `/dev/input` is missing or unreadable
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hitch_rover::controller::joycon::JoyConController;
    ///
    /// let controller = JoyConController::open("Joy-Con (R)")?;
    /// println!("Connected to controller at: {}", controller.device_path().display());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(device_name: &str) -> Result<Self> {
        Self::open_in(Path::new(INPUT_DIR), device_name)
    }

    /// Same as [`open`](Self::open) but scanning `input_dir`.
    pub fn open_in(input_dir: &Path, device_name: &str) -> Result<Self> {
        if !input_dir.exists() {
            return Err(RoverError::Controller(format!(
                "{} directory not found",
                input_dir.display()
            )));
        }

        for path in event_nodes(input_dir)? {
            let device = match Device::open(&path) {
                Ok(device) => device,
                Err(e) => {
                    // Permission denied or a node that vanished mid-scan
                    debug!("Could not open {}: {}", path.display(), e);
                    continue;
                }
            };

            let name = device.name().unwrap_or_default();
            debug!("Found input device: {} ({:?})", path.display(), name);
            if !name.eq_ignore_ascii_case(device_name) {
                continue;
            }

            set_nonblocking(&device).map_err(|e| {
                RoverError::Controller(format!("Failed to configure {}: {}", path.display(), e))
            })?;
            let stick_range = read_stick_range(&device);
            info!(
                "Found {} at {} (stick range {}..={})",
                name,
                path.display(),
                stick_range.min,
                stick_range.max
            );

            return Ok(Self {
                device,
                device_path: path,
                stick_range,
                connected: true,
            });
        }

        Err(RoverError::ControllerNotFound(device_name.to_string()))
    }

    pub fn device_path(&self) -> &Path {
        &self.device_path
    }

    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }
}

impl InputSource for JoyConController {
    fn poll(&mut self) -> Result<Vec<InputEvent>> {
        if !self.connected {
            return Err(RoverError::ControllerDisconnected);
        }

        match self.device.fetch_events() {
            Ok(events) => Ok(events.collect()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(Vec::new()),
            Err(e) => {
                self.connected = false;
                if e.raw_os_error() == Some(libc::ENODEV) {
                    Err(RoverError::ControllerDisconnected)
                } else {
                    Err(RoverError::Controller(format!("Failed to fetch events: {}", e)))
                }
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected && self.device_path.exists()
    }

    fn stick_range(&self) -> AxisRange {
        self.stick_range
    }

    fn describe(&self) -> String {
        format!(
            "{} ({})",
            self.device.name().unwrap_or("unnamed device"),
            self.device_path.display()
        )
    }
}

/// [`InputConnector`] that scans for a Joy-Con by name
#[derive(Debug, Clone)]
pub struct JoyConConnector {
    device_name: String,
    input_dir: PathBuf,
}

impl JoyConConnector {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            input_dir: PathBuf::from(INPUT_DIR),
        }
    }

    /// Scan a different directory (tests, containers with remapped /dev)
    pub fn with_input_dir(mut self, input_dir: impl Into<PathBuf>) -> Self {
        self.input_dir = input_dir.into();
        self
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl InputConnector for JoyConConnector {
    fn connect(&mut self) -> Result<Box<dyn InputSource>> {
        let controller = JoyConController::open_in(&self.input_dir, &self.device_name)?;
        Ok(Box::new(controller))
    }
}

/// `event*` nodes in `input_dir`, sorted for a deterministic pick
fn event_nodes(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(input_dir).map_err(|e| {
        RoverError::Controller(format!("Failed to read {}: {}", input_dir.display(), e))
    })?;

    let mut nodes: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().starts_with("event"))
                .unwrap_or(false)
        })
        .collect();
    nodes.sort();
    Ok(nodes)
}

fn set_nonblocking(device: &Device) -> io::Result<()> {
    let fd = device.as_raw_fd();
    // SAFETY: fd belongs to `device`, which outlives both calls
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Stick limits from the device's ABS_RX info, falling back to 0-255
fn read_stick_range(device: &Device) -> AxisRange {
    match device.get_abs_state() {
        Ok(state) => {
            let info = state[AbsoluteAxisType::ABS_RX.0 as usize];
            if info.maximum > info.minimum {
                AxisRange::new(info.minimum, info.maximum)
            } else {
                AxisRange::default()
            }
        }
        Err(e) => {
            warn!("Could not read axis limits, assuming 0-255: {}", e);
            AxisRange::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_device_name() {
        assert_eq!(DEFAULT_DEVICE_NAME, "Joy-Con (R)");
    }

    #[test]
    fn test_missing_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("input");

        match JoyConController::open_in(&missing, DEFAULT_DEVICE_NAME) {
            Err(RoverError::Controller(msg)) => assert!(msg.contains("not found")),
            other => panic!("Expected Controller error, got: {:?}", other),
        }
    }

    #[test]
    fn test_no_matching_device() {
        let dir = tempfile::tempdir().unwrap();
        // Plain files are not evdev nodes and fail to open
        std::fs::write(dir.path().join("event0"), b"").unwrap();
        std::fs::write(dir.path().join("mouse0"), b"").unwrap();

        match JoyConController::open_in(dir.path(), DEFAULT_DEVICE_NAME) {
            Err(RoverError::ControllerNotFound(name)) => assert_eq!(name, "Joy-Con (R)"),
            other => panic!("Expected ControllerNotFound, got: {:?}", other),
        }
    }

    #[test]
    fn test_event_nodes_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["event10", "js0", "event2", "mice", "event1"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let names: Vec<String> = event_nodes(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["event1", "event10", "event2"]);
    }

    #[test]
    fn test_connector_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut connector = JoyConConnector::new("Pro Controller").with_input_dir(dir.path());

        assert_eq!(connector.device_name(), "Pro Controller");
        assert!(matches!(
            connector.connect(),
            Err(RoverError::ControllerNotFound(_))
        ));
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_open_with_real_hardware() {
        let controller = JoyConController::open(DEFAULT_DEVICE_NAME).expect("Joy-Con not found");
        assert!(controller.device_path().starts_with(INPUT_DIR));
        assert!(controller.is_connected());
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_poll_with_real_hardware() {
        let mut controller = JoyConController::open(DEFAULT_DEVICE_NAME).expect("Joy-Con not found");

        println!("Move the stick or press a button within 5 seconds...");
        for _ in 0..100 {
            let events = controller.poll().expect("poll failed");
            if !events.is_empty() {
                println!("Received {} events", events.len());
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        panic!("No events received from controller");
    }
}
