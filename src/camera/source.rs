use crate::config::{CameraBackend, CameraConfig};
use crate::error::CameraError;
use crate::frame::Frame;
use tracing::{info, warn};

use super::ReplayFrameSource;

/// Anything that yields full-resolution frames to the detection loop.
///
/// Reads are synchronous; a source is owned by a single loop and released
/// exactly once, either explicitly or on drop.
pub trait FrameSource: Send {
    /// Read the next frame
    fn read_frame(&mut self) -> Result<Frame, CameraError>;

    /// Stop capturing and free the device. Further reads fail with
    /// [`CameraError::Released`].
    fn release(&mut self);

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}

/// Try each camera index in order and return the first source that opens.
pub fn open_first_available<F>(
    indices: &[u32],
    mut open: F,
) -> Result<Box<dyn FrameSource>, CameraError>
where
    F: FnMut(u32) -> Result<Box<dyn FrameSource>, CameraError>,
{
    for &index in indices {
        match open(index) {
            Ok(source) => {
                info!("Opened camera index {}: {}", index, source.describe());
                return Ok(source);
            }
            Err(e) => {
                warn!("Camera index {} unavailable: {}", index, e);
            }
        }
    }

    Err(CameraError::NoneAvailable {
        indices: indices.to_vec(),
    })
}

/// Open the frame source selected by configuration
pub fn open_from_config(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    match config.backend {
        CameraBackend::Replay => {
            let source = ReplayFrameSource::open(&config.replay_path)?;
            Ok(Box::new(source))
        }
        CameraBackend::V4l2 => open_v4l2(config),
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn open_v4l2(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    use super::V4l2FrameSource;

    open_first_available(&config.indices, |index| {
        V4l2FrameSource::open(index, config).map(|source| Box::new(source) as Box<dyn FrameSource>)
    })
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn open_v4l2(_config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    Err(CameraError::BackendUnavailable {
        backend: "v4l2 (build with the `camera` feature)".to_string(),
    })
}
