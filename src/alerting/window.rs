use crate::config::WindowPolicy;
use std::time::Duration;
use tokio::time::Instant;

/// What one tick did to the active window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTransition {
    /// Motion opened a new window
    Opened { ends_at: Instant },
    /// Motion pushed the end of the open window back
    Extended { ends_at: Instant },
    /// The window is open; process a frame
    Continued { ends_at: Instant },
    /// The window just expired
    Closed,
    /// No window and no motion
    Idle,
}

impl WindowTransition {
    /// Whether a frame should be processed on this tick
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            WindowTransition::Opened { .. }
                | WindowTransition::Extended { .. }
                | WindowTransition::Continued { .. }
        )
    }
}

/// Motion-gated detection window
#[derive(Debug, Clone)]
pub struct DetectionWindow {
    duration: Duration,
    policy: WindowPolicy,
    ends_at: Option<Instant>,
}

impl DetectionWindow {
    pub fn new(duration: Duration, policy: WindowPolicy) -> Self {
        Self {
            duration,
            policy,
            ends_at: None,
        }
    }

    pub fn ends_at(&self) -> Option<Instant> {
        self.ends_at
    }

    pub fn is_open(&self) -> bool {
        self.ends_at.is_some()
    }

    /// Motion only matters while idle, unless it can extend the window
    pub fn needs_motion(&self) -> bool {
        !self.is_open() || self.policy == WindowPolicy::ExtendOnMotion
    }

    /// Advance the window. An expired window closes without reopening on
    /// the same tick.
    pub fn tick(&mut self, motion: bool, now: Instant) -> WindowTransition {
        match self.ends_at {
            None if motion => {
                let ends_at = now + self.duration;
                self.ends_at = Some(ends_at);
                WindowTransition::Opened { ends_at }
            }
            None => WindowTransition::Idle,
            Some(ends_at) if now >= ends_at => {
                self.ends_at = None;
                WindowTransition::Closed
            }
            Some(ends_at) => {
                let extended = now + self.duration;
                if motion && self.policy == WindowPolicy::ExtendOnMotion && extended > ends_at {
                    self.ends_at = Some(extended);
                    WindowTransition::Extended { ends_at: extended }
                } else {
                    WindowTransition::Continued { ends_at }
                }
            }
        }
    }

    pub fn close(&mut self) {
        self.ends_at = None;
    }
}
