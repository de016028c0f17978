use crate::error::HardwareError;
use serde::{Deserialize, Serialize};

/// Logic level of a two-state pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinLevel {
    Low,
    High,
}

impl PinLevel {
    pub fn is_high(self) -> bool {
        self == PinLevel::High
    }
}

impl std::fmt::Display for PinLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PinLevel::Low => write!(f, "LOW"),
            PinLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Two-state output driving the buzzer
pub trait OutputPin: Send {
    fn set_level(&mut self, level: PinLevel) -> Result<(), HardwareError>;

    /// Drive low and hand the pin back to the system
    fn release(&mut self) -> Result<(), HardwareError>;

    fn describe(&self) -> String;
}

/// Short two-line text display
pub trait TextDisplay: Send {
    fn show(&mut self, line1: &str, line2: &str) -> Result<(), HardwareError>;

    fn clear(&mut self) -> Result<(), HardwareError>;

    /// Blank the display and free the bus
    fn release(&mut self) -> Result<(), HardwareError>;

    /// Characters per line
    fn columns(&self) -> usize;
}

/// Cut a line to the display width on a character boundary
pub fn fit_to_width(text: &str, columns: usize) -> String {
    text.chars().take(columns).collect()
}
