use super::{ComponentState, FacewatchOrchestrator, ShutdownReason};
use crate::events::FacewatchEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Shared stop request. The first reason given wins; later requests only
/// find the token already cancelled.
#[derive(Clone, Default)]
pub struct ShutdownHandle {
    token: CancellationToken,
    reason: Arc<Mutex<Option<ShutdownReason>>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `false` if one was already requested.
    pub fn request(&self, reason: ShutdownReason) -> bool {
        {
            let mut slot = self.reason.lock();
            if slot.is_some() {
                return false;
            }
            info!("Shutdown requested: {}", reason);
            *slot = Some(reason);
        }
        self.token.cancel();
        true
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.lock().clone()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Resolves once shutdown has been requested
    pub async fn requested(&self) {
        self.token.cancelled().await
    }
}

impl FacewatchOrchestrator {
    /// Release every resource exactly once and return the exit code.
    ///
    /// Safe to call again; later calls only return the first exit code.
    pub async fn shutdown(&mut self, reason: ShutdownReason) -> i32 {
        if let Some(code) = self.exit_code {
            return code;
        }

        // Record the reason for anyone still watching the handle
        self.shutdown.request(reason.clone());
        self.machine.shutdown();

        info!("Beginning graceful shutdown ({})", reason);
        self.event_bus.publish(FacewatchEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: reason.to_string(),
        });

        if let Some(keyboard) = &self.keyboard_handler {
            self.component_states
                .insert("keyboard".to_string(), ComponentState::Stopping);
            keyboard.stop().await;
            self.set_component_state("keyboard", ComponentState::Stopped);
        }

        let exit_code = reason.exit_code();
        self.release_resources(&reason);

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        self.exit_code = Some(exit_code);
        exit_code
    }

    /// Final message, then hardware, camera and database in reverse
    /// startup order
    pub(super) fn release_resources(&mut self, reason: &ShutdownReason) {
        if self.released {
            return;
        }
        self.released = true;

        let (line1, line2) = reason.display_lines();
        self.driver.status(&line1, &line2);

        self.set_component_state("hardware", ComponentState::Stopping);
        self.driver.release();
        if let Err(e) = self.sensor.release() {
            error!("Failed to release motion sensor: {}", e);
        }
        self.set_component_state("hardware", ComponentState::Stopped);

        self.set_component_state("camera", ComponentState::Stopping);
        self.camera.release();
        self.set_component_state("camera", ComponentState::Stopped);

        self.set_component_state("storage", ComponentState::Stopping);
        self.store.close();
        self.set_component_state("storage", ComponentState::Stopped);
    }
}

impl Drop for FacewatchOrchestrator {
    fn drop(&mut self) {
        // Unwinding or an early return still frees the devices
        if !self.released {
            let reason = self
                .shutdown
                .reason()
                .unwrap_or_else(|| ShutdownReason::Error("terminated unexpectedly".to_string()));
            self.release_resources(&reason);
        }
    }
}
