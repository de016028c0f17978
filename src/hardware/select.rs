use super::{
    is_raspberry_pi, ConsoleDisplay, ContinuousMotionSensor, I2cLcd, LoggingPin, MotionSensor,
    OutputPin, SysfsMotionSensor, SysfsOutputPin, TextDisplay, SYSFS_GPIO_ROOT,
};
use crate::config::{AlertConfig, DisplayConfig, HardwareMode};
use tracing::{info, warn};

/// Peripherals chosen for this run
pub struct Peripherals {
    pub pin: Box<dyn OutputPin>,
    pub display: Option<Box<dyn TextDisplay>>,
    pub sensor: Box<dyn MotionSensor>,
    /// Whether the real GPIO/I2C variants were attempted
    pub real_hardware: bool,
}

/// Pick real or console peripherals. Each real device that fails to open
/// falls back to its console variant on its own.
pub fn select_peripherals(alert: &AlertConfig, display_config: &DisplayConfig) -> Peripherals {
    let real_hardware = match alert.hardware {
        HardwareMode::Real => true,
        HardwareMode::Mock => false,
        HardwareMode::Auto => {
            let detected = is_raspberry_pi();
            info!(
                "Hardware auto-detection: {}",
                if detected {
                    "Raspberry Pi"
                } else {
                    "not a Raspberry Pi, using console peripherals"
                }
            );
            detected
        }
    };

    if !real_hardware {
        return Peripherals {
            pin: Box::new(LoggingPin::new(alert.buzzer_pin)),
            display: display_config.enabled.then(|| {
                Box::new(ConsoleDisplay::new(display_config.cols)) as Box<dyn TextDisplay>
            }),
            sensor: Box::new(ContinuousMotionSensor::new()),
            real_hardware,
        };
    }

    let pin: Box<dyn OutputPin> = match SysfsOutputPin::open(SYSFS_GPIO_ROOT, alert.buzzer_pin) {
        Ok(pin) => Box::new(pin),
        Err(e) => {
            warn!("Buzzer unavailable ({}); logging alerts instead", e);
            Box::new(LoggingPin::new(alert.buzzer_pin))
        }
    };

    let sensor: Box<dyn MotionSensor> =
        match SysfsMotionSensor::open(SYSFS_GPIO_ROOT, alert.motion_pin) {
            Ok(sensor) => Box::new(sensor),
            Err(e) => {
                warn!("Motion sensor unavailable ({}); assuming constant motion", e);
                Box::new(ContinuousMotionSensor::new())
            }
        };

    let display: Option<Box<dyn TextDisplay>> = if display_config.enabled {
        match I2cLcd::open(
            display_config.i2c_bus,
            display_config.i2c_address,
            display_config.cols,
            display_config.rows,
        ) {
            Ok(lcd) => Some(Box::new(lcd)),
            Err(e) => {
                warn!("LCD unavailable ({}); printing display messages", e);
                Some(Box::new(ConsoleDisplay::new(display_config.cols)))
            }
        }
    } else {
        info!("Display disabled by configuration");
        None
    };

    Peripherals {
        pin,
        display,
        sensor,
        real_hardware,
    }
}
