use super::{fit_to_width, OutputPin, PinLevel, TextDisplay};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// First display line while an alert is sounding
pub const ALERT_HEADLINE: &str = "CRIMINAL DETECTED!";

/// How an alert hold ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// The full hold elapsed
    Completed,
    /// Shutdown was requested during the hold
    Interrupted,
    /// The driver had already been released
    Skipped,
}

/// Buzzer plus optional text display.
///
/// Peripheral errors are logged and never stop the loop. Release happens
/// exactly once, either through [`AlertDriver::release`] or on drop.
pub struct AlertDriver {
    pin: Box<dyn OutputPin>,
    display: Option<Box<dyn TextDisplay>>,
    hold: Duration,
    released: bool,
}

impl AlertDriver {
    pub fn new(
        pin: Box<dyn OutputPin>,
        display: Option<Box<dyn TextDisplay>>,
        hold: Duration,
    ) -> Self {
        let screen = if display.is_some() {
            "display"
        } else {
            "no display"
        };
        info!("Alert driver: {} with {}, hold {:?}", pin.describe(), screen, hold);
        Self {
            pin,
            display,
            hold,
            released: false,
        }
    }

    pub fn has_display(&self) -> bool {
        self.display.is_some()
    }

    /// Show a two-line status message
    pub fn status(&mut self, line1: &str, line2: &str) {
        if self.released {
            return;
        }
        if let Some(display) = self.display.as_mut() {
            let columns = display.columns();
            let result = display.show(&fit_to_width(line1, columns), &fit_to_width(line2, columns));
            if let Err(e) = result {
                warn!("Display update failed: {}", e);
            }
        }
    }

    pub fn clear_display(&mut self) {
        if self.released {
            return;
        }
        if let Some(display) = self.display.as_mut() {
            if let Err(e) = display.clear() {
                warn!("Display clear failed: {}", e);
            }
        }
    }

    /// Sound the buzzer and show `identity` for the hold period.
    ///
    /// Blocks the caller for the whole hold unless `cancel` fires first. The
    /// pin is driven low again in either case.
    pub async fn alert(&mut self, identity: &str, cancel: &CancellationToken) -> AlertOutcome {
        if self.released {
            warn!("Alert for {} skipped: hardware already released", identity);
            return AlertOutcome::Skipped;
        }

        self.status(ALERT_HEADLINE, identity);
        if let Err(e) = self.pin.set_level(PinLevel::High) {
            warn!("Failed to sound buzzer: {}", e);
        }

        let outcome = tokio::select! {
            _ = tokio::time::sleep(self.hold) => AlertOutcome::Completed,
            _ = cancel.cancelled() => AlertOutcome::Interrupted,
        };

        if let Err(e) = self.pin.set_level(PinLevel::Low) {
            warn!("Failed to silence buzzer: {}", e);
        }
        self.clear_display();

        if outcome == AlertOutcome::Interrupted {
            info!("Alert for {} cut short by shutdown", identity);
        }
        outcome
    }

    /// Silence and free the peripherals. Returns `false` if already released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;

        if let Err(e) = self.pin.release() {
            warn!("Failed to release {}: {}", self.pin.describe(), e);
        }
        if let Some(display) = self.display.as_mut() {
            if let Err(e) = display.release() {
                warn!("Failed to release display: {}", e);
            }
        }
        info!("Alert hardware released");
        true
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for AlertDriver {
    fn drop(&mut self) {
        self.release();
    }
}
