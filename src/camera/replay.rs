use crate::error::CameraError;
use crate::frame::Frame;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

use super::FrameSource;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Replays still images from a directory in file-name order, looping
/// forever. Lets the terminal run on a bench without a camera.
pub struct ReplayFrameSource {
    directory: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
    frame_counter: u64,
    released: bool,
}

impl ReplayFrameSource {
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self, CameraError> {
        let directory = directory.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&directory).map_err(|e| CameraError::DeviceOpen {
            device: directory.display().to_string(),
            details: e.to_string(),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::DeviceOpen {
                device: directory.display().to_string(),
                details: "no images to replay".to_string(),
            });
        }

        info!(
            "Replaying {} frames from {}",
            files.len(),
            directory.display()
        );

        Ok(Self {
            directory,
            files,
            position: 0,
            frame_counter: 0,
            released: false,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ReplayFrameSource {
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        if self.released {
            return Err(CameraError::Released);
        }

        let path = &self.files[self.position];
        self.position = (self.position + 1) % self.files.len();

        let image = image::open(path)
            .map_err(|e| CameraError::ReadFailed {
                details: format!("{}: {}", path.display(), e),
            })?
            .to_rgb8();

        let frame_id = self.frame_counter;
        self.frame_counter += 1;
        debug!("Replayed frame {} from {}", frame_id, path.display());

        Ok(Frame::new(frame_id, SystemTime::now(), image))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            debug!("Replay source {} released", self.directory.display());
        }
    }

    fn describe(&self) -> String {
        format!("replay of {}", self.directory.display())
    }
}
