use super::{AlertDecision, CooldownTable, DetectionWindow, WindowTransition};
use crate::config::DetectionConfig;
use crate::recognition::MatchResult;
use tokio::time::Instant;
use tracing::{debug, info};

/// Where the detection loop is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    ActiveWindow { ends_at: Instant },
    Shutdown,
}

/// Window gating plus the per-identity cooldown
pub struct AlertStateMachine {
    window: DetectionWindow,
    cooldown: CooldownTable,
    state: DetectorState,
}

impl AlertStateMachine {
    pub fn new(window: DetectionWindow, cooldown: CooldownTable) -> Self {
        Self {
            window,
            cooldown,
            state: DetectorState::Idle,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            DetectionWindow::new(config.active_window(), config.window_policy),
            CooldownTable::new(config.cooldown()),
        )
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_shutdown(&self) -> bool {
        self.state == DetectorState::Shutdown
    }

    /// Whether the motion sensor should be polled before the next tick
    pub fn wants_motion(&self) -> bool {
        !self.is_shutdown() && self.window.needs_motion()
    }

    pub fn cooldown(&self) -> &CooldownTable {
        &self.cooldown
    }

    /// Advance the window with this tick's motion reading
    pub fn tick(&mut self, motion: bool, now: Instant) -> WindowTransition {
        if self.is_shutdown() {
            return WindowTransition::Idle;
        }

        let transition = self.window.tick(motion, now);
        match transition {
            WindowTransition::Opened { ends_at } => {
                info!("Motion detected, scanning");
                self.state = DetectorState::ActiveWindow { ends_at };
            }
            WindowTransition::Extended { ends_at } => {
                debug!("Motion continues, window extended");
                self.state = DetectorState::ActiveWindow { ends_at };
            }
            WindowTransition::Closed => {
                info!("Scan complete, back to monitoring");
                self.state = DetectorState::Idle;
            }
            WindowTransition::Continued { .. } | WindowTransition::Idle => {}
        }
        transition
    }

    /// Apply the cooldown rule to one match. Unknown faces return `None`
    /// and never touch the table.
    pub fn on_match(&mut self, result: &MatchResult, now: Instant) -> Option<AlertDecision> {
        if self.is_shutdown() {
            return None;
        }
        let identity = result.identity.as_deref()?;
        let decision = self.cooldown.check_and_update(identity, now);
        match decision {
            AlertDecision::New => info!(
                "New alert for {} (distance {:.3})",
                identity, result.distance
            ),
            AlertDecision::Suppressed { remaining } => debug!(
                "Alert for {} suppressed, {:.1}s of cooldown left",
                identity,
                remaining.as_secs_f32()
            ),
        }
        Some(decision)
    }

    /// Enter the terminal state
    pub fn shutdown(&mut self) {
        self.window.close();
        self.state = DetectorState::Shutdown;
    }
}
