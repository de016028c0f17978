use super::{fit_to_width, TextDisplay};
use crate::error::HardwareError;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

// PCF8574 backpack wiring: P0=RS, P2=EN, P3=backlight, P4..P7=D4..D7
const MODE_COMMAND: u8 = 0x00;
const MODE_CHARACTER: u8 = 0x01;
const ENABLE: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

const CMD_CLEAR: u8 = 0x01;
const LINE_ADDRESSES: [u8; 4] = [0x80, 0xC0, 0x94, 0xD4];

/// 4-bit initialisation, 2-line mode, display on with cursor off, left-to-right entry
const INIT_SEQUENCE: [u8; 5] = [0x33, 0x32, 0x28, 0x0C, 0x06];

/// HD44780 character LCD behind a PCF8574 I2C expander.
///
/// Generic over the byte sink so the nibble protocol can run against an
/// in-memory buffer.
pub struct Hd44780Lcd<W: Write + Send> {
    bus: W,
    columns: usize,
    rows: usize,
    pulse_delay: Duration,
    backlight: bool,
}

impl<W: Write + Send> Hd44780Lcd<W> {
    pub fn new(bus: W, columns: usize, rows: usize) -> Result<Self, HardwareError> {
        Self::with_pulse_delay(bus, columns, rows, Duration::from_micros(500))
    }

    pub fn with_pulse_delay(
        bus: W,
        columns: usize,
        rows: usize,
        pulse_delay: Duration,
    ) -> Result<Self, HardwareError> {
        let mut lcd = Self {
            bus,
            columns,
            rows: rows.clamp(1, LINE_ADDRESSES.len()),
            pulse_delay,
            backlight: true,
        };

        for command in INIT_SEQUENCE {
            lcd.send(command, MODE_COMMAND)?;
        }
        lcd.send(CMD_CLEAR, MODE_COMMAND)?;
        lcd.pause(Duration::from_millis(2));

        debug!("LCD initialised ({}x{})", columns, lcd.rows);
        Ok(lcd)
    }

    fn pause(&self, duration: Duration) {
        if !self.pulse_delay.is_zero() {
            std::thread::sleep(duration);
        }
    }

    fn backlight_bits(&self) -> u8 {
        if self.backlight {
            BACKLIGHT
        } else {
            0
        }
    }

    fn write_raw(&mut self, data: u8) -> Result<(), HardwareError> {
        self.bus
            .write_all(&[data])
            .map_err(|e| HardwareError::Display {
                details: e.to_string(),
            })
    }

    fn write_nibble(&mut self, data: u8) -> Result<(), HardwareError> {
        self.write_raw(data)?;
        self.write_raw(data | ENABLE)?;
        self.pause(self.pulse_delay);
        self.write_raw(data & !ENABLE)?;
        self.pause(self.pulse_delay);
        Ok(())
    }

    fn send(&mut self, value: u8, mode: u8) -> Result<(), HardwareError> {
        let bits = mode | self.backlight_bits();
        self.write_nibble(bits | (value & 0xF0))?;
        self.write_nibble(bits | ((value << 4) & 0xF0))
    }

    fn write_line(&mut self, row: usize, text: &str) -> Result<(), HardwareError> {
        self.send(LINE_ADDRESSES[row], MODE_COMMAND)?;

        let fitted = fit_to_width(text, self.columns);
        let padding = self.columns - fitted.chars().count();
        for ch in fitted.chars().chain(std::iter::repeat(' ').take(padding)) {
            let byte = if ch.is_ascii() { ch as u8 } else { b'?' };
            self.send(byte, MODE_CHARACTER)?;
        }
        Ok(())
    }

    /// Consume the driver and return the underlying bus
    pub fn into_inner(self) -> W {
        self.bus
    }
}

impl<W: Write + Send> TextDisplay for Hd44780Lcd<W> {
    fn show(&mut self, line1: &str, line2: &str) -> Result<(), HardwareError> {
        self.write_line(0, line1)?;
        if self.rows > 1 {
            self.write_line(1, line2)?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), HardwareError> {
        self.send(CMD_CLEAR, MODE_COMMAND)?;
        self.pause(Duration::from_millis(2));
        Ok(())
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        self.clear()?;
        self.backlight = false;
        self.write_raw(0)
    }

    fn columns(&self) -> usize {
        self.columns
    }
}

/// `/dev/i2c-N` bound to one slave address
pub struct I2cDevice {
    file: std::fs::File,
}

#[cfg(target_os = "linux")]
impl I2cDevice {
    /// `I2C_SLAVE` from linux/i2c-dev.h
    const I2C_SLAVE: libc::c_ulong = 0x0703;

    pub fn open(bus: u32, address: u16) -> Result<Self, HardwareError> {
        use std::os::unix::io::AsRawFd;

        let device = format!("/dev/i2c-{}", bus);
        let i2c_error = |details: String| HardwareError::I2c {
            device: device.clone(),
            address,
            details,
        };

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&device)
            .map_err(|e| i2c_error(e.to_string()))?;

        // SAFETY: the fd is owned by `file` and stays open for the call
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                Self::I2C_SLAVE as _,
                address as libc::c_ulong,
            )
        };
        if rc < 0 {
            return Err(i2c_error(std::io::Error::last_os_error().to_string()));
        }

        info!("Opened {} at address {:#04x}", device, address);
        Ok(Self { file })
    }
}

#[cfg(not(target_os = "linux"))]
impl I2cDevice {
    pub fn open(bus: u32, address: u16) -> Result<Self, HardwareError> {
        Err(HardwareError::NotAvailable(format!(
            "I2C bus {} (address {:#04x}) requires Linux",
            bus, address
        )))
    }
}

impl Write for I2cDevice {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

/// The LCD as wired on the terminal
pub type I2cLcd = Hd44780Lcd<I2cDevice>;

impl I2cLcd {
    pub fn open(bus: u32, address: u16, columns: usize, rows: usize) -> Result<Self, HardwareError> {
        let device = I2cDevice::open(bus, address)?;
        Hd44780Lcd::new(device, columns, rows)
    }
}
