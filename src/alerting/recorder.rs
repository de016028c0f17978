use crate::config::{EmptyCropPolicy, StorageConfig};
use crate::error::StorageError;
use crate::frame::{FaceRegion, Frame};
use crate::storage::AuditStore;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of recording one qualifying match
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Recorded {
        alert_id: i64,
        image_path: Option<PathBuf>,
    },
    /// The crop came out empty and the policy says skip
    SkippedEmptyCrop,
    /// No identity row for the name; a saved image stays orphaned
    IdentityUnresolved { image_path: Option<PathBuf> },
    ImageWriteFailed { reason: String },
    PersistenceFailed { reason: String },
}

impl RecordOutcome {
    pub fn alert_id(&self) -> Option<i64> {
        match self {
            RecordOutcome::Recorded { alert_id, .. } => Some(*alert_id),
            _ => None,
        }
    }

    /// Short explanation for outcomes that wrote no alert row
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            RecordOutcome::Recorded { .. } => None,
            RecordOutcome::SkippedEmptyCrop => Some("empty face crop".to_string()),
            RecordOutcome::IdentityUnresolved { .. } => {
                Some("identity not found in the gallery".to_string())
            }
            RecordOutcome::ImageWriteFailed { reason }
            | RecordOutcome::PersistenceFailed { reason } => Some(reason.clone()),
        }
    }
}

/// Writes the face crop and the alert row for a new alert
pub struct EventRecorder {
    store: Arc<dyn AuditStore>,
    faces_dir: PathBuf,
    terminal_id: String,
    empty_crop_policy: EmptyCropPolicy,
    timezone: Tz,
    scale_factor: f32,
}

impl EventRecorder {
    pub fn new(
        store: Arc<dyn AuditStore>,
        config: &StorageConfig,
        scale_factor: f32,
    ) -> Result<Self, StorageError> {
        let faces_dir = config.faces_dir();
        std::fs::create_dir_all(&faces_dir).map_err(|e| StorageError::ImageWrite {
            path: faces_dir.display().to_string(),
            details: e.to_string(),
        })?;

        Ok(Self {
            store,
            faces_dir,
            terminal_id: config.terminal_id.clone(),
            empty_crop_policy: config.empty_crop_policy,
            timezone: resolve_timezone(&config.timestamp_timezone),
            scale_factor,
        })
    }

    pub fn faces_dir(&self) -> &Path {
        &self.faces_dir
    }

    /// Crop, save, resolve, persist. `region` is in detection-frame
    /// coordinates. Never fails; every problem becomes an outcome.
    pub fn record(&self, frame: &Frame, region: &FaceRegion, identity: &str) -> RecordOutcome {
        let full_region = region.to_full_resolution(self.scale_factor);

        let image_path = match frame.crop(&full_region) {
            Some(crop) => {
                let path = self.crop_path(identity, frame);
                if let Err(e) = DynamicImage::ImageRgb8(crop).save_with_format(&path, ImageFormat::Jpeg)
                {
                    error!("Failed to save face crop {}: {}", path.display(), e);
                    return RecordOutcome::ImageWriteFailed {
                        reason: e.to_string(),
                    };
                }
                debug!("Saved face crop {}", path.display());
                Some(path)
            }
            None => match self.empty_crop_policy {
                EmptyCropPolicy::SkipRecord => {
                    warn!(
                        "Face crop for {} at {} is empty, alert not recorded",
                        identity, full_region
                    );
                    return RecordOutcome::SkippedEmptyCrop;
                }
                EmptyCropPolicy::RecordWithoutImage => {
                    warn!(
                        "Face crop for {} at {} is empty, recording without image",
                        identity, full_region
                    );
                    None
                }
            },
        };

        let identity_key = match self.store.resolve_identity_key(identity) {
            Ok(Some(key)) => key,
            Ok(None) => {
                error!("Identity '{}' not found, alert not recorded", identity);
                return RecordOutcome::IdentityUnresolved { image_path };
            }
            Err(e) => {
                error!("Failed to resolve identity '{}': {}", identity, e);
                return RecordOutcome::PersistenceFailed {
                    reason: e.to_string(),
                };
            }
        };

        match self
            .store
            .save_alert(identity_key, image_path.as_deref(), &self.terminal_id)
        {
            Ok(alert_id) => {
                info!("Alert {} recorded for {}", alert_id, identity);
                RecordOutcome::Recorded {
                    alert_id,
                    image_path,
                }
            }
            Err(e) => {
                error!("Failed to save alert for {}: {}", identity, e);
                RecordOutcome::PersistenceFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// `{identity}_{timestamp}.jpg`, suffixed when the name is taken
    fn crop_path(&self, identity: &str, frame: &Frame) -> PathBuf {
        let local = DateTime::<Utc>::from(frame.timestamp).with_timezone(&self.timezone);
        let stem = format!(
            "{}_{}",
            sanitize_identity(identity),
            local.format("%Y%m%d_%H%M%S_%6f")
        );

        let mut path = self.faces_dir.join(format!("{}.jpg", stem));
        let mut suffix = 1;
        while path.exists() {
            path = self.faces_dir.join(format!("{}_{}.jpg", stem, suffix));
            suffix += 1;
        }
        path
    }
}

/// Keep names filesystem-safe
pub fn sanitize_identity(identity: &str) -> String {
    let cleaned: String = identity
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// Configured zone, UTC when it does not parse
pub(crate) fn resolve_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warn!("Invalid timestamp timezone '{}', falling back to UTC", name);
            chrono_tz::UTC
        }
    }
}
