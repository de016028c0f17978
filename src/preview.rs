use crate::config::PreviewConfig;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Keeps the latest annotated frame on disk, at most once per interval
pub struct PreviewWriter {
    path: PathBuf,
    interval: Duration,
    last_write: Option<Instant>,
}

impl PreviewWriter {
    pub fn new<P: Into<PathBuf>>(path: P, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            last_write: None,
        }
    }

    /// `None` when previews are disabled
    pub fn from_config(config: &PreviewConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(&config.path, Duration::from_millis(config.interval_ms)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.last_write
            .map(|last| now.saturating_duration_since(last) >= self.interval)
            .unwrap_or(true)
    }

    /// Write `image` if the interval has passed. Returns whether it did.
    pub fn offer(&mut self, image: &RgbImage, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.last_write = Some(now);

        // Write then rename so readers never see a half-written JPEG
        let tmp = self.path.with_extension("jpg.tmp");
        let result = DynamicImage::ImageRgb8(image.clone())
            .save_with_format(&tmp, ImageFormat::Jpeg)
            .map_err(|e| e.to_string())
            .and_then(|_| std::fs::rename(&tmp, &self.path).map_err(|e| e.to_string()));

        match result {
            Ok(()) => {
                debug!("Preview written to {}", self.path.display());
                true
            }
            Err(e) => {
                warn!("Failed to write preview {}: {}", self.path.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rate_limited_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preview.jpg");
        let mut writer = PreviewWriter::new(&path, Duration::from_millis(500));
        let image = RgbImage::new(8, 8);
        let t0 = Instant::now();

        assert!(writer.offer(&image, t0));
        assert!(path.exists());
        assert!(!writer.offer(&image, t0 + Duration::from_millis(100)));
        assert!(writer.offer(&image, t0 + Duration::from_millis(500)));
        assert!(!dir.path().join("preview.jpg.tmp").exists());
    }

    #[test]
    fn test_disabled_by_default() {
        let config = crate::config::FacewatchConfig::default().preview;
        assert!(PreviewWriter::from_config(&config).is_none());
    }
}
