mod driver;
mod gpio;
mod lcd;
pub mod mock;
mod presence;
mod select;
mod sensor;
mod types;
#[cfg(test)]
mod tests;

pub use driver::{AlertDriver, AlertOutcome, ALERT_HEADLINE};
pub use gpio::{Direction, SysfsGpio, SysfsMotionSensor, SysfsOutputPin, SYSFS_GPIO_ROOT};
pub use lcd::{Hd44780Lcd, I2cDevice, I2cLcd};
pub use mock::{ConsoleDisplay, HardwareEvent, HardwareLog, LoggingPin};
pub use presence::{detect_raspberry_pi, is_raspberry_pi};
pub use select::{select_peripherals, Peripherals};
pub use sensor::{
    ContinuousMotionSensor, ManualTrigger, MotionSensor, ScriptedMotionSensor,
    TriggeredMotionSensor,
};
pub use types::{fit_to_width, OutputPin, PinLevel, TextDisplay};
