//! Stand-ins for the buzzer and display: console-logging variants used
//! when the hardware is absent, and recording variants for tests.

use super::{fit_to_width, OutputPin, PinLevel, TextDisplay};
use crate::error::HardwareError;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Output pin that only logs level changes
pub struct LoggingPin {
    pin: u32,
    level: PinLevel,
}

impl LoggingPin {
    pub fn new(pin: u32) -> Self {
        info!("Using console buzzer for GPIO {}", pin);
        Self {
            pin,
            level: PinLevel::Low,
        }
    }
}

impl OutputPin for LoggingPin {
    fn set_level(&mut self, level: PinLevel) -> Result<(), HardwareError> {
        if level != self.level {
            info!(
                "[BUZZER] GPIO {} {}",
                self.pin,
                if level.is_high() { "ON" } else { "OFF" }
            );
        }
        self.level = level;
        Ok(())
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        self.set_level(PinLevel::Low)?;
        debug!("[BUZZER] GPIO {} cleaned up", self.pin);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("console buzzer (GPIO {})", self.pin)
    }
}

/// Display that prints its lines to the log
pub struct ConsoleDisplay {
    columns: usize,
}

impl ConsoleDisplay {
    pub fn new(columns: usize) -> Self {
        Self { columns }
    }
}

impl TextDisplay for ConsoleDisplay {
    fn show(&mut self, line1: &str, line2: &str) -> Result<(), HardwareError> {
        info!(
            "[LCD] {} | {}",
            fit_to_width(line1, self.columns),
            fit_to_width(line2, self.columns)
        );
        Ok(())
    }

    fn clear(&mut self) -> Result<(), HardwareError> {
        debug!("[LCD] cleared");
        Ok(())
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }

    fn columns(&self) -> usize {
        self.columns
    }
}

/// What a recording peripheral observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareEvent {
    Pin(PinLevel),
    PinReleased,
    Display(String, String),
    DisplayCleared,
    DisplayReleased,
}

/// Shared log written by [`RecordingPin`] and [`RecordingDisplay`]
#[derive(Clone, Default)]
pub struct HardwareLog {
    events: Arc<Mutex<Vec<HardwareEvent>>>,
}

impl HardwareLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&self) -> RecordingPin {
        RecordingPin {
            log: self.clone(),
            level: PinLevel::Low,
        }
    }

    pub fn display(&self, columns: usize) -> RecordingDisplay {
        RecordingDisplay {
            log: self.clone(),
            columns,
        }
    }

    fn push(&self, event: HardwareEvent) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<HardwareEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &HardwareEvent) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    /// Lines shown on the display, in order
    pub fn messages(&self) -> Vec<(String, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                HardwareEvent::Display(l1, l2) => Some((l1.clone(), l2.clone())),
                _ => None,
            })
            .collect()
    }
}

pub struct RecordingPin {
    log: HardwareLog,
    level: PinLevel,
}

impl RecordingPin {
    pub fn level(&self) -> PinLevel {
        self.level
    }
}

impl OutputPin for RecordingPin {
    fn set_level(&mut self, level: PinLevel) -> Result<(), HardwareError> {
        self.level = level;
        self.log.push(HardwareEvent::Pin(level));
        Ok(())
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        self.level = PinLevel::Low;
        self.log.push(HardwareEvent::PinReleased);
        Ok(())
    }

    fn describe(&self) -> String {
        "recording pin".to_string()
    }
}

pub struct RecordingDisplay {
    log: HardwareLog,
    columns: usize,
}

impl TextDisplay for RecordingDisplay {
    fn show(&mut self, line1: &str, line2: &str) -> Result<(), HardwareError> {
        self.log.push(HardwareEvent::Display(
            fit_to_width(line1, self.columns),
            fit_to_width(line2, self.columns),
        ));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), HardwareError> {
        self.log.push(HardwareEvent::DisplayCleared);
        Ok(())
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        self.log.push(HardwareEvent::DisplayReleased);
        Ok(())
    }

    fn columns(&self) -> usize {
        self.columns
    }
}
