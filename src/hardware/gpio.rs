use super::{MotionSensor, OutputPin, PinLevel};
use crate::error::HardwareError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default sysfs GPIO root
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// udev needs a moment to create and chmod the pin directory after export
const EXPORT_SETTLE_ATTEMPTS: u32 = 20;
const EXPORT_SETTLE_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// One pin under the sysfs GPIO interface
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    pin: u32,
    exported_by_us: bool,
}

impl SysfsGpio {
    /// Export `pin` (if not already exported) and set its direction
    pub fn export<P: AsRef<Path>>(
        root: P,
        pin: u32,
        direction: Direction,
    ) -> Result<Self, HardwareError> {
        let root = root.as_ref().to_path_buf();
        let pin_dir = root.join(format!("gpio{}", pin));
        let mut exported_by_us = false;

        if !pin_dir.exists() {
            fs::write(root.join("export"), pin.to_string())
                .map_err(|source| HardwareError::GpioExport { pin, source })?;
            exported_by_us = true;

            for _ in 0..EXPORT_SETTLE_ATTEMPTS {
                if pin_dir.exists() {
                    break;
                }
                std::thread::sleep(EXPORT_SETTLE_DELAY);
            }
        }

        let mut gpio = Self {
            root,
            pin,
            exported_by_us,
        };

        let configured = if pin_dir.exists() {
            gpio.write_attribute("direction", direction.as_str())
        } else {
            Err(HardwareError::Gpio {
                pin,
                details: format!("{} did not appear after export", pin_dir.display()),
            })
        };

        if let Err(e) = configured {
            // Leave the pin as we found it
            if let Err(unexport_err) = gpio.unexport() {
                warn!("{}", unexport_err);
            }
            return Err(e);
        }

        debug!("GPIO {} configured as {}", pin, direction.as_str());
        Ok(gpio)
    }

    fn attribute_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin)).join(name)
    }

    fn write_attribute(&self, name: &str, value: &str) -> Result<(), HardwareError> {
        let path = self.attribute_path(name);
        let mut last_error = None;

        for _ in 0..EXPORT_SETTLE_ATTEMPTS {
            match fs::write(&path, value) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                    last_error = Some(e);
                    std::thread::sleep(EXPORT_SETTLE_DELAY);
                }
                Err(e) => {
                    last_error = Some(e);
                    break;
                }
            }
        }

        Err(HardwareError::Gpio {
            pin: self.pin,
            details: format!(
                "writing {} to {}: {}",
                value,
                path.display(),
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ),
        })
    }

    pub fn write(&self, level: PinLevel) -> Result<(), HardwareError> {
        self.write_attribute("value", if level.is_high() { "1" } else { "0" })
    }

    pub fn read(&self) -> Result<PinLevel, HardwareError> {
        let path = self.attribute_path("value");
        let raw = fs::read_to_string(&path).map_err(|e| HardwareError::Gpio {
            pin: self.pin,
            details: format!("reading {}: {}", path.display(), e),
        })?;

        Ok(if raw.trim() == "1" {
            PinLevel::High
        } else {
            PinLevel::Low
        })
    }

    /// Unexport the pin if this process exported it
    pub fn unexport(&mut self) -> Result<(), HardwareError> {
        if !self.exported_by_us {
            return Ok(());
        }
        self.exported_by_us = false;

        fs::write(self.root.join("unexport"), self.pin.to_string()).map_err(|e| {
            HardwareError::Gpio {
                pin: self.pin,
                details: format!("unexport failed: {}", e),
            }
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }
}

/// Buzzer on a sysfs GPIO output, initialised low
pub struct SysfsOutputPin {
    gpio: SysfsGpio,
    released: bool,
}

impl SysfsOutputPin {
    pub fn open<P: AsRef<Path>>(root: P, pin: u32) -> Result<Self, HardwareError> {
        let gpio = SysfsGpio::export(root, pin, Direction::Out)?;
        gpio.write(PinLevel::Low)?;
        info!("Buzzer ready on GPIO {}", pin);
        Ok(Self {
            gpio,
            released: false,
        })
    }
}

impl OutputPin for SysfsOutputPin {
    fn set_level(&mut self, level: PinLevel) -> Result<(), HardwareError> {
        if self.released {
            return Err(HardwareError::NotAvailable(format!(
                "GPIO {} already released",
                self.gpio.pin()
            )));
        }
        self.gpio.write(level)
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let low = self.gpio.write(PinLevel::Low);
        let unexport = self.gpio.unexport();
        low.and(unexport)
    }

    fn describe(&self) -> String {
        format!("sysfs GPIO {}", self.gpio.pin())
    }
}

impl Drop for SysfsOutputPin {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release buzzer GPIO: {}", e);
        }
    }
}

/// PIR sensor on a sysfs GPIO input; high means motion
pub struct SysfsMotionSensor {
    gpio: SysfsGpio,
}

impl SysfsMotionSensor {
    pub fn open<P: AsRef<Path>>(root: P, pin: u32) -> Result<Self, HardwareError> {
        let gpio = SysfsGpio::export(root, pin, Direction::In)?;
        info!("Motion sensor ready on GPIO {}", pin);
        Ok(Self { gpio })
    }
}

impl MotionSensor for SysfsMotionSensor {
    fn motion_detected(&mut self) -> Result<bool, HardwareError> {
        Ok(self.gpio.read()?.is_high())
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        self.gpio.unexport()
    }
}

impl Drop for SysfsMotionSensor {
    fn drop(&mut self) {
        let _ = self.gpio.unexport();
    }
}
