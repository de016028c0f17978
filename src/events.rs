use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events emitted by the detection loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FacewatchEvent {
    /// Motion opened a new active window
    WindowOpened {
        duration: Duration,
        timestamp: SystemTime,
    },
    /// Motion pushed the end of the active window back
    WindowExtended {
        duration: Duration,
        timestamp: SystemTime,
    },
    /// The active window expired
    WindowClosed { timestamp: SystemTime },
    /// A face was located and matched (or not) against the gallery
    FaceObserved {
        identity: Option<String>,
        distance: f32,
        timestamp: SystemTime,
    },
    /// An identity crossed its cooldown and raised an alert
    AlertRaised {
        identity: String,
        distance: f32,
        timestamp: SystemTime,
    },
    /// A repeat sighting inside the cooldown period
    AlertSuppressed {
        identity: String,
        remaining: Duration,
    },
    /// The alert was written to the audit trail
    AlertRecorded {
        identity: String,
        alert_id: i64,
        image_path: Option<PathBuf>,
    },
    /// The alert fired but no audit row was written
    AlertNotRecorded { identity: String, reason: String },
    /// A component reported an error the loop recovered from
    SystemError { component: String, error: String },
    /// Shutdown was requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl FacewatchEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            FacewatchEvent::WindowOpened { timestamp, .. }
            | FacewatchEvent::WindowExtended { timestamp, .. }
            | FacewatchEvent::WindowClosed { timestamp }
            | FacewatchEvent::FaceObserved { timestamp, .. }
            | FacewatchEvent::AlertRaised { timestamp, .. }
            | FacewatchEvent::ShutdownRequested { timestamp, .. } => *timestamp,
            FacewatchEvent::AlertSuppressed { .. }
            | FacewatchEvent::AlertRecorded { .. }
            | FacewatchEvent::AlertNotRecorded { .. }
            | FacewatchEvent::SystemError { .. } => SystemTime::now(),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            FacewatchEvent::WindowOpened { duration, .. } => {
                format!("Detection window opened for {}s", duration.as_secs())
            }
            FacewatchEvent::WindowExtended { duration, .. } => {
                format!("Detection window extended by {}s", duration.as_secs())
            }
            FacewatchEvent::WindowClosed { .. } => "Detection window closed".to_string(),
            FacewatchEvent::FaceObserved {
                identity, distance, ..
            } => format!(
                "Face observed: {} (distance {:.3})",
                identity.as_deref().unwrap_or("Unknown"),
                distance
            ),
            FacewatchEvent::AlertRaised {
                identity, distance, ..
            } => format!("Alert raised for {} (distance {:.3})", identity, distance),
            FacewatchEvent::AlertSuppressed {
                identity,
                remaining,
            } => format!(
                "Alert for {} suppressed, {:.1}s of cooldown left",
                identity,
                remaining.as_secs_f32()
            ),
            FacewatchEvent::AlertRecorded {
                identity, alert_id, ..
            } => format!("Alert {} recorded for {}", alert_id, identity),
            FacewatchEvent::AlertNotRecorded { identity, reason } => {
                format!("Alert for {} not recorded: {}", identity, reason)
            }
            FacewatchEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            FacewatchEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            FacewatchEvent::WindowOpened { .. } => "window_opened",
            FacewatchEvent::WindowExtended { .. } => "window_extended",
            FacewatchEvent::WindowClosed { .. } => "window_closed",
            FacewatchEvent::FaceObserved { .. } => "face_observed",
            FacewatchEvent::AlertRaised { .. } => "alert_raised",
            FacewatchEvent::AlertSuppressed { .. } => "alert_suppressed",
            FacewatchEvent::AlertRecorded { .. } => "alert_recorded",
            FacewatchEvent::AlertNotRecorded { .. } => "alert_not_recorded",
            FacewatchEvent::SystemError { .. } => "system_error",
            FacewatchEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Broadcast bus the detector publishes on. Publishing never blocks the
/// loop and succeeds whether or not anyone is listening.
pub struct EventBus {
    sender: broadcast::Sender<FacewatchEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<FacewatchEvent> {
        self.sender.subscribe()
    }

    /// Subscribe through a filter; `name` tags the receiver in logs
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event, returning how many subscribers received it
    pub fn publish(&self, event: FacewatchEvent) -> usize {
        match &event {
            FacewatchEvent::AlertRaised {
                identity, distance, ..
            } => {
                warn!(identity = %identity, distance = *distance, "Alert raised");
            }
            FacewatchEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            FacewatchEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        // A send error only means nobody is subscribed
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
    /// Alert-related events for specific identities
    Identities(Vec<String>),
}

impl EventFilter {
    pub fn matches(&self, event: &FacewatchEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Identities(identities) => match event {
                FacewatchEvent::AlertRaised { identity, .. }
                | FacewatchEvent::AlertSuppressed { identity, .. }
                | FacewatchEvent::AlertRecorded { identity, .. }
                | FacewatchEvent::AlertNotRecorded { identity, .. } => {
                    identities.contains(identity)
                }
                FacewatchEvent::FaceObserved {
                    identity: Some(identity),
                    ..
                } => identities.contains(identity),
                _ => false,
            },
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<FacewatchEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<FacewatchEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next event that passes the filter
    pub async fn recv(&mut self) -> Result<FacewatchEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { count: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<FacewatchEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { count: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
