use crate::error::FacewatchError;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info, warn};

/// Recovery action to take after an error
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Retry after a delay
    RetryAfterDelay(Duration),
    /// Skip the failed step and keep the loop running
    Continue,
    /// Shutdown the system gracefully
    Shutdown,
}

/// Recovery strategy configuration
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Attempts after which a failure is reported at error level
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    pub exponential_backoff: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            exponential_backoff: true,
        }
    }
}

/// Maps component failures inside the detection loop to recovery actions.
///
/// The camera is retried forever with capped backoff; a frame read failure
/// never tears the loop down. Storage, display and recognition failures
/// skip the current step.
pub struct RecoveryManager {
    config: RecoveryConfig,
    retry_counts: HashMap<String, u32>,
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoveryManager {
    pub fn new() -> Self {
        Self::with_config(RecoveryConfig::default())
    }

    pub fn with_config(config: RecoveryConfig) -> Self {
        Self {
            config,
            retry_counts: HashMap::new(),
        }
    }

    /// Determine recovery action for an error
    pub fn handle_error(&mut self, component: &str, error: &FacewatchError) -> RecoveryAction {
        if !error.is_recoverable() {
            error!("Non-recoverable error in {}: {}", component, error);
            return RecoveryAction::Shutdown;
        }

        let retry_count = self.retry_counts.get(component).copied().unwrap_or(0);
        self.retry_counts
            .insert(component.to_string(), retry_count.saturating_add(1));

        match component {
            "camera" => {
                let delay = self.calculate_delay(retry_count);
                if retry_count + 1 == self.config.max_retries {
                    error!(
                        "Camera has failed {} consecutive reads, still retrying: {}",
                        retry_count + 1,
                        error
                    );
                } else {
                    warn!(
                        "Frame read failed (attempt {}), retrying in {:?}: {}",
                        retry_count + 1,
                        delay,
                        error
                    );
                }
                RecoveryAction::RetryAfterDelay(delay)
            }
            _ => {
                warn!("Error in {}, continuing: {}", component, error);
                RecoveryAction::Continue
            }
        }
    }

    /// Reset retry count for a component after a successful operation
    pub fn reset_retry_count(&mut self, component: &str) {
        if let Some(count) = self.retry_counts.remove(component) {
            if count >= self.config.max_retries {
                info!("Component {} recovered after {} failures", component, count);
            }
        }
    }

    /// Calculate delay for retry with exponential backoff
    fn calculate_delay(&self, retry_count: u32) -> Duration {
        if !self.config.exponential_backoff {
            return self.config.base_delay;
        }

        let factor = 2_u32.saturating_pow(retry_count.min(16));
        self.config
            .base_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }

    pub fn get_retry_count(&self, component: &str) -> u32 {
        self.retry_counts.get(component).copied().unwrap_or(0)
    }

    pub fn has_exceeded_retry_limit(&self, component: &str) -> bool {
        self.get_retry_count(component) >= self.config.max_retries
    }
}
