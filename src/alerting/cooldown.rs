use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Whether a match of a known identity should raise an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// First sighting, or the cooldown has run out
    New,
    /// Repeat sighting inside the cooldown period
    Suppressed { remaining: Duration },
}

impl AlertDecision {
    pub fn is_new(&self) -> bool {
        matches!(self, AlertDecision::New)
    }
}

/// Identity -> instant of its last alert, for this run only
#[derive(Debug, Clone)]
pub struct CooldownTable {
    period: Duration,
    last_alert: HashMap<String, Instant>,
}

impl CooldownTable {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_alert: HashMap::new(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Decide and, on a new alert, stamp `now` in one step
    pub fn check_and_update(&mut self, identity: &str, now: Instant) -> AlertDecision {
        if let Some(last) = self.last_alert.get(identity) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.period {
                return AlertDecision::Suppressed {
                    remaining: self.period - elapsed,
                };
            }
        }

        self.last_alert.insert(identity.to_string(), now);
        AlertDecision::New
    }

    pub fn last_alert(&self, identity: &str) -> Option<Instant> {
        self.last_alert.get(identity).copied()
    }

    pub fn len(&self) -> usize {
        self.last_alert.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_alert.is_empty()
    }
}
