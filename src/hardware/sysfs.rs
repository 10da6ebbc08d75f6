//! # Sysfs PWM Output
//!
//! Drives one H-bridge (BTS7960 style: RPWM/LPWM inputs, optional R_EN/L_EN
//! tied to one enable line) through the Linux PWM and GPIO sysfs interfaces.
//!
//! ## Layout
//!
//! ```text
//! <root>/pwm/pwmchipN/export           write channel number to export
//! <root>/pwm/pwmchipN/pwmM/period      period in nanoseconds
//! <root>/pwm/pwmchipN/pwmM/duty_cycle  active time in nanoseconds
//! <root>/pwm/pwmchipN/pwmM/enable      0 / 1
//! <root>/gpio/gpioK/{direction,value}  enable line
//! ```
//!
//! A PCA9685 board bound to the `pwm-pca9685` driver shows up as a pwmchip
//! with 16 channels, enough for all five motors.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::HardwareOutput;
use crate::config::MotorPinConfig;
use crate::error::{Result, RoverError};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// One exported PWM channel
#[derive(Debug)]
struct PwmChannel {
    chip_dir: PathBuf,
    channel: u32,
    dir: PathBuf,
}

impl PwmChannel {
    fn export(chip_dir: &Path, channel: u32, period_ns: u64) -> std::io::Result<Self> {
        let dir = chip_dir.join(format!("pwm{}", channel));
        if !dir.exists() {
            fs::write(chip_dir.join("export"), channel.to_string())?;
        }
        if !dir.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} did not appear after export", dir.display()),
            ));
        }

        let pwm = Self {
            chip_dir: chip_dir.to_path_buf(),
            channel,
            dir,
        };
        // duty_cycle must never exceed period, so zero it before changing the period
        pwm.write_attr("duty_cycle", 0)?;
        pwm.write_attr("period", period_ns)?;
        pwm.write_attr("enable", 1)?;
        Ok(pwm)
    }

    fn write_attr(&self, attr: &str, value: u64) -> std::io::Result<()> {
        fs::write(self.dir.join(attr), value.to_string())
    }

    fn unexport(&self) -> std::io::Result<()> {
        self.write_attr("duty_cycle", 0)?;
        self.write_attr("enable", 0)?;
        fs::write(self.chip_dir.join("unexport"), self.channel.to_string())
    }
}

/// Enable line shared by both halves of the bridge
#[derive(Debug)]
struct EnablePin {
    gpio_root: PathBuf,
    number: u32,
    dir: PathBuf,
}

impl EnablePin {
    fn export(gpio_root: &Path, number: u32) -> std::io::Result<Self> {
        let dir = gpio_root.join(format!("gpio{}", number));
        if !dir.exists() {
            fs::write(gpio_root.join("export"), number.to_string())?;
        }
        fs::write(dir.join("direction"), "out")?;
        fs::write(dir.join("value"), "1")?;
        Ok(Self {
            gpio_root: gpio_root.to_path_buf(),
            number,
            dir,
        })
    }

    fn unexport(&self) -> std::io::Result<()> {
        fs::write(self.dir.join("value"), "0")?;
        fs::write(self.gpio_root.join("unexport"), self.number.to_string())
    }
}

/// [`HardwareOutput`] backed by two sysfs PWM channels
#[derive(Debug)]
pub struct SysfsPwmOutput {
    name: String,
    period_ns: u64,
    forward: PwmChannel,
    reverse: PwmChannel,
    enable: Option<EnablePin>,
    released: bool,
}

impl SysfsPwmOutput {
    /// Export and configure the channels for one motor.
    ///
    /// # Arguments
    ///
    /// * `root` - sysfs class directory, normally `/sys/class`
    /// * `name` - motor name for logs and errors
    /// * `pins` - chip, channel and enable assignment
    /// * `frequency_hz` - PWM frequency (10 kHz keeps BTS7960 drivers quiet)
    ///
    /// # Errors
    ///
    /// Returns `Hardware` if the chip is missing or any attribute write fails.
    pub fn open(root: &str, name: &str, pins: MotorPinConfig, frequency_hz: u32) -> Result<Self> {
        let root = Path::new(root);
        let chip_dir = root.join("pwm").join(format!("pwmchip{}", pins.pwm_chip));
        if !chip_dir.exists() {
            return Err(RoverError::hardware(
                name,
                format!("{} not found", chip_dir.display()),
            ));
        }

        let period_ns = NANOS_PER_SECOND / u64::from(frequency_hz.max(1));
        let io_err = |what: &str, e: std::io::Error| {
            RoverError::hardware(name, format!("Failed to set up {}: {}", what, e))
        };

        let forward = PwmChannel::export(&chip_dir, pins.forward_channel, period_ns)
            .map_err(|e| io_err("forward channel", e))?;
        let reverse = PwmChannel::export(&chip_dir, pins.reverse_channel, period_ns)
            .map_err(|e| io_err("reverse channel", e))?;
        let enable = pins
            .enable_gpio
            .map(|gpio| EnablePin::export(&root.join("gpio"), gpio))
            .transpose()
            .map_err(|e| io_err("enable pin", e))?;

        info!(
            "{}: pwmchip{} forward=pwm{} reverse=pwm{} enable={:?} ({} Hz)",
            name, pins.pwm_chip, pins.forward_channel, pins.reverse_channel, pins.enable_gpio, frequency_hz
        );

        Ok(Self {
            name: name.to_string(),
            period_ns,
            forward,
            reverse,
            enable,
            released: false,
        })
    }

    fn duty_ns(&self, duty: f32) -> u64 {
        let fraction = f64::from(duty.clamp(0.0, 100.0)) / 100.0;
        (self.period_ns as f64 * fraction).round() as u64
    }

    fn write_duty(&self, pwm: &PwmChannel, duty: f32) -> Result<()> {
        if self.released {
            return Err(RoverError::hardware(&self.name, "write after release"));
        }
        let duty_ns = self.duty_ns(duty);
        pwm.write_attr("duty_cycle", duty_ns).map_err(|e| {
            RoverError::hardware(&self.name, format!("Failed to write pwm{} duty: {}", pwm.channel, e))
        })?;
        debug!("{}: pwm{} duty_cycle={}ns", self.name, pwm.channel, duty_ns);
        Ok(())
    }
}

impl HardwareOutput for SysfsPwmOutput {
    fn write_forward(&mut self, duty: f32) -> Result<()> {
        self.write_duty(&self.forward, duty)
    }

    fn write_reverse(&mut self, duty: f32) -> Result<()> {
        self.write_duty(&self.reverse, duty)
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        // Keep going past individual failures so every pin gets a release attempt
        let mut first_error = None;
        let results = [
            ("forward channel", self.forward.unexport()),
            ("reverse channel", self.reverse.unexport()),
            (
                "enable pin",
                self.enable.as_ref().map_or(Ok(()), EnablePin::unexport),
            ),
        ];
        for (what, result) in results {
            if let Err(e) = result {
                warn!("{}: failed to release {}: {}", self.name, what, e);
                first_error.get_or_insert_with(|| {
                    RoverError::hardware(&self.name, format!("Failed to release {}: {}", what, e))
                });
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(channels: &[u32], gpios: &[u32]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for channel in channels {
            fs::create_dir_all(dir.path().join(format!("pwm/pwmchip0/pwm{}", channel))).unwrap();
        }
        for gpio in gpios {
            fs::create_dir_all(dir.path().join(format!("gpio/gpio{}", gpio))).unwrap();
        }
        dir
    }

    fn read_attr(root: &Path, rel: &str) -> String {
        fs::read_to_string(root.join(rel)).unwrap()
    }

    fn pins(forward: u32, reverse: u32, enable: Option<u32>) -> MotorPinConfig {
        MotorPinConfig {
            pwm_chip: 0,
            forward_channel: forward,
            reverse_channel: reverse,
            enable_gpio: enable,
        }
    }

    #[test]
    fn test_open_configures_period_and_enable() {
        let root = fake_sysfs(&[0, 1], &[17]);
        let root_str = root.path().to_string_lossy().to_string();

        let output = SysfsPwmOutput::open(&root_str, "Front Left", pins(0, 1, Some(17)), 10000);
        assert!(output.is_ok());

        assert_eq!(read_attr(root.path(), "pwm/pwmchip0/pwm0/period"), "100000");
        assert_eq!(read_attr(root.path(), "pwm/pwmchip0/pwm1/enable"), "1");
        assert_eq!(read_attr(root.path(), "pwm/pwmchip0/pwm0/duty_cycle"), "0");
        assert_eq!(read_attr(root.path(), "gpio/gpio17/direction"), "out");
        assert_eq!(read_attr(root.path(), "gpio/gpio17/value"), "1");
    }

    #[test]
    fn test_write_duty_scales_to_period() {
        let root = fake_sysfs(&[2, 3], &[]);
        let root_str = root.path().to_string_lossy().to_string();

        let mut output = SysfsPwmOutput::open(&root_str, "Front Right", pins(2, 3, None), 10000).unwrap();
        output.write_forward(25.0).unwrap();
        output.write_reverse(0.0).unwrap();

        assert_eq!(read_attr(root.path(), "pwm/pwmchip0/pwm2/duty_cycle"), "25000");
        assert_eq!(read_attr(root.path(), "pwm/pwmchip0/pwm3/duty_cycle"), "0");
    }

    #[test]
    fn test_duty_is_clamped() {
        let root = fake_sysfs(&[0, 1], &[]);
        let root_str = root.path().to_string_lossy().to_string();

        let mut output = SysfsPwmOutput::open(&root_str, "Actuator", pins(0, 1, None), 1000).unwrap();
        output.write_forward(250.0).unwrap();

        assert_eq!(read_attr(root.path(), "pwm/pwmchip0/pwm0/duty_cycle"), "1000000");
    }

    #[test]
    fn test_release_disables_everything() {
        let root = fake_sysfs(&[4, 5], &[22]);
        let root_str = root.path().to_string_lossy().to_string();

        let mut output = SysfsPwmOutput::open(&root_str, "Rear Left", pins(4, 5, Some(22)), 10000).unwrap();
        output.write_forward(60.0).unwrap();
        output.release().unwrap();

        assert_eq!(read_attr(root.path(), "pwm/pwmchip0/pwm4/duty_cycle"), "0");
        assert_eq!(read_attr(root.path(), "pwm/pwmchip0/pwm4/enable"), "0");
        assert_eq!(read_attr(root.path(), "pwm/pwmchip0/unexport"), "5");
        assert_eq!(read_attr(root.path(), "gpio/gpio22/value"), "0");

        // Second release is a no-op, further writes are refused
        assert!(output.release().is_ok());
        assert!(output.write_forward(10.0).is_err());
    }

    #[test]
    fn test_missing_chip_is_hardware_error() {
        let root = tempfile::tempdir().unwrap();
        let root_str = root.path().to_string_lossy().to_string();

        match SysfsPwmOutput::open(&root_str, "Rear Right", pins(6, 7, None), 10000) {
            Err(RoverError::Hardware { motor, message }) => {
                assert_eq!(motor, "Rear Right");
                assert!(message.contains("pwmchip0"));
            }
            other => panic!("Expected Hardware error, got: {:?}", other),
        }
    }

    #[test]
    fn test_channel_that_never_appears_fails() {
        // Chip exists but the export write does not create pwm9 in a plain directory
        let root = fake_sysfs(&[8], &[]);
        let root_str = root.path().to_string_lossy().to_string();

        assert!(SysfsPwmOutput::open(&root_str, "Actuator", pins(8, 9, None), 10000).is_err());
    }
}
