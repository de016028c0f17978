use super::{FacewatchOrchestrator, ShutdownHandle, ShutdownReason};
use crate::alerting::{AlertDecision, RecordOutcome, WindowTransition};
use crate::error::FacewatchError;
use crate::events::FacewatchEvent;
use crate::frame::Frame;
use crate::recovery::RecoveryAction;
use std::time::{Duration, SystemTime};
use tokio::signal;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

impl FacewatchOrchestrator {
    /// Run until a stop request or fatal error, then shut down
    pub async fn run(&mut self) -> i32 {
        info!("Facewatch terminal is running");

        setup_signal_handlers(self.shutdown.clone());
        self.start().await;

        let reason = self.detection_loop().await;
        let exit_code = self.shutdown(reason).await;

        info!("Facewatch terminal shutdown complete");
        exit_code
    }

    /// The single detection loop. Returns why it stopped.
    pub async fn detection_loop(&mut self) -> ShutdownReason {
        let idle_refresh = Duration::from_secs(self.config.display.idle_refresh_seconds);
        let mut last_status = Instant::now();

        while !self.shutdown.is_requested() {
            let motion = if self.machine.wants_motion() {
                self.poll_motion()
            } else {
                false
            };

            let now = Instant::now();
            match self.machine.tick(motion, now) {
                WindowTransition::Opened { .. } => {
                    self.summary.windows_opened += 1;
                    self.driver.status("Motion Detected!", "Scanning...");
                    self.event_bus.publish(FacewatchEvent::WindowOpened {
                        duration: self.config.detection.active_window(),
                        timestamp: SystemTime::now(),
                    });
                }
                WindowTransition::Extended { ends_at } => {
                    self.event_bus.publish(FacewatchEvent::WindowExtended {
                        duration: ends_at.saturating_duration_since(now),
                        timestamp: SystemTime::now(),
                    });
                }
                WindowTransition::Continued { .. } => {}
                WindowTransition::Closed => {
                    self.driver.status("Scan Complete", "Monitoring...");
                    self.event_bus.publish(FacewatchEvent::WindowClosed {
                        timestamp: SystemTime::now(),
                    });
                    last_status = now;
                    continue;
                }
                WindowTransition::Idle => {
                    if !idle_refresh.is_zero() && now.duration_since(last_status) >= idle_refresh {
                        self.driver.status("Status: Idle", "Monitoring...");
                        last_status = now;
                    }
                    self.pause(self.config.detection.motion_poll_interval())
                        .await;
                    continue;
                }
            }

            self.process_frame().await;
            self.pause(self.config.detection.frame_interval()).await;
        }

        self.shutdown
            .reason()
            .unwrap_or(ShutdownReason::UserRequest)
    }

    fn poll_motion(&mut self) -> bool {
        self.summary.motion_polls += 1;
        match self.sensor.motion_detected() {
            Ok(motion) => motion,
            Err(e) => {
                let e = FacewatchError::from(e);
                self.recovery.handle_error("motion_sensor", &e);
                false
            }
        }
    }

    /// Read, recognise and act on one frame
    async fn process_frame(&mut self) {
        let frame = match self.camera.read_frame() {
            Ok(frame) => {
                self.recovery.reset_retry_count("camera");
                frame
            }
            Err(e) => {
                self.summary.frame_read_failures += 1;
                self.event_bus.publish(FacewatchEvent::SystemError {
                    component: "camera".to_string(),
                    error: e.to_string(),
                });
                let e = FacewatchError::from(e);
                match self.recovery.handle_error("camera", &e) {
                    RecoveryAction::RetryAfterDelay(delay) => self.pause(delay).await,
                    RecoveryAction::Continue => {}
                    RecoveryAction::Shutdown => {
                        self.shutdown.request(ShutdownReason::Error(e.to_string()));
                    }
                }
                return;
            }
        };
        self.summary.frames_processed += 1;

        let observations = match self.pipeline.analyze(&frame) {
            Ok(observations) => observations,
            Err(e) => {
                self.recovery
                    .handle_error("recognition", &FacewatchError::from(e));
                return;
            }
        };

        let mut annotated = self
            .annotator
            .as_ref()
            .and(self.preview.as_ref())
            .map(|_| frame.image.clone());

        let now = Instant::now();
        for observation in observations {
            self.summary.faces_observed += 1;
            let result = &observation.result;
            let region = observation.detection.region;

            self.event_bus.publish(FacewatchEvent::FaceObserved {
                identity: result.identity.clone(),
                distance: result.distance,
                timestamp: SystemTime::now(),
            });

            if let (Some(annotator), Some(image)) = (&self.annotator, annotated.as_mut()) {
                let full = region.to_full_resolution(self.pipeline.scale_factor());
                annotator.annotate(image, &full, result.label(), result.is_known());
            }

            let Some(identity) = result.identity.clone() else {
                debug!("Unknown face at {} (distance {:.3})", region, result.distance);
                continue;
            };

            match self.machine.on_match(result, now) {
                Some(AlertDecision::New) => {
                    self.raise_alert(&frame, &region, &identity, result.distance)
                        .await;
                    if self.shutdown.is_requested() {
                        break;
                    }
                }
                Some(AlertDecision::Suppressed { remaining }) => {
                    self.summary.alerts_suppressed += 1;
                    self.event_bus
                        .publish(FacewatchEvent::AlertSuppressed { identity, remaining });
                }
                None => {}
            }
        }

        if let (Some(preview), Some(image)) = (self.preview.as_mut(), annotated.as_ref()) {
            preview.offer(image, Instant::now());
        }
    }

    /// Record first, then sound the alert. The alert fires even when
    /// nothing could be recorded.
    async fn raise_alert(
        &mut self,
        frame: &Frame,
        region: &crate::frame::FaceRegion,
        identity: &str,
        distance: f32,
    ) {
        self.summary.alerts_raised += 1;
        self.event_bus.publish(FacewatchEvent::AlertRaised {
            identity: identity.to_string(),
            distance,
            timestamp: SystemTime::now(),
        });

        let outcome = self.recorder.record(frame, region, identity);
        match &outcome {
            RecordOutcome::Recorded {
                alert_id,
                image_path,
            } => {
                self.summary.alerts_recorded += 1;
                self.event_bus.publish(FacewatchEvent::AlertRecorded {
                    identity: identity.to_string(),
                    alert_id: *alert_id,
                    image_path: image_path.clone(),
                });
            }
            other => {
                let reason = other.failure_reason().unwrap_or_default();
                warn!("Alert for {} not recorded: {}", identity, reason);
                self.event_bus.publish(FacewatchEvent::AlertNotRecorded {
                    identity: identity.to_string(),
                    reason,
                });
            }
        }

        let token = self.shutdown.token().clone();
        self.driver.alert(identity, &token).await;
    }

    /// Sleep that ends early on shutdown
    pub(super) async fn pause(&self, duration: Duration) {
        if duration.is_zero() {
            tokio::task::yield_now().await;
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.requested() => {}
        }
    }
}

/// SIGINT/SIGTERM become shutdown requests
fn setup_signal_handlers(shutdown: ShutdownHandle) {
    // Handle SIGTERM (systemd stop) - Unix only
    #[cfg(unix)]
    {
        let shutdown_sigterm = shutdown.clone();
        tokio::spawn(async move {
            let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!("Failed to register SIGTERM handler: {}", e);
                    return;
                }
            };
            tokio::select! {
                Some(()) = sigterm.recv() => {
                    info!("Received SIGTERM signal");
                    shutdown_sigterm.request(ShutdownReason::Signal("SIGTERM".to_string()));
                }
                _ = shutdown_sigterm.requested() => {}
            }
        });
    }

    // Handle SIGINT (Ctrl+C) - Cross-platform
    tokio::spawn(async move {
        tokio::select! {
            result = signal::ctrl_c() => {
                if result.is_ok() {
                    info!("Received SIGINT signal (Ctrl+C)");
                    shutdown.request(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
            _ = shutdown.requested() => {}
        }
    });
}
