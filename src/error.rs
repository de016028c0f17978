use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FacewatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl FacewatchError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>, M: Into<String>>(component: S, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether the detection loop may keep running after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            FacewatchError::Camera(e) => e.is_recoverable(),
            FacewatchError::Hardware(_) => true,
            FacewatchError::Storage(_) => true,
            FacewatchError::Recognition(_) => true,
            FacewatchError::Image(_) => true,
            FacewatchError::Io(_) => true,
            FacewatchError::Component { .. } => true,
            FacewatchError::Config(_)
            | FacewatchError::Serialization(_)
            | FacewatchError::System { .. } => false,
        }
    }
}

/// Frame source failures
#[derive(Error, Debug, Clone)]
pub enum CameraError {
    #[error("Failed to open camera device {device}: {details}")]
    DeviceOpen { device: String, details: String },

    #[error("No camera could be opened (tried indices {indices:?})")]
    NoneAvailable { indices: Vec<u32> },

    #[error("Camera backend '{backend}' is not available in this build")]
    BackendUnavailable { backend: String },

    #[error("Frame read failed: {details}")]
    ReadFailed { details: String },

    #[error("Timed out after {timeout:?} waiting for a frame")]
    FrameTimeout { timeout: Duration },

    #[error("Camera has been released")]
    Released,
}

impl CameraError {
    /// Read-side failures are transient; open failures are not
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CameraError::ReadFailed { .. } | CameraError::FrameTimeout { .. }
        )
    }
}

/// Actuator, sensor and display failures
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("GPIO {pin} error: {details}")]
    Gpio { pin: u32, details: String },

    #[error("GPIO {pin} could not be exported: {source}")]
    GpioExport {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("I2C device {device} (address {address:#04x}) error: {details}")]
    I2c {
        device: String,
        address: u16,
        details: String,
    },

    #[error("Display write failed: {details}")]
    Display { details: String },

    #[error("Hardware not available: {0}")]
    NotAvailable(String),
}

/// Gallery and alert database failures
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database at {path} could not be opened: {details}")]
    Open { path: String, details: String },

    #[error("Stored signature for '{identity}' is malformed ({len} bytes)")]
    MalformedSignature { identity: String, len: usize },

    #[error("Database connection already closed")]
    Closed,

    #[error("Failed to write face image {path}: {details}")]
    ImageWrite { path: String, details: String },
}

/// Face location and encoding failures
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Model {path} could not be loaded: {details}")]
    ModelLoad { path: String, details: String },

    #[error("Inference failed: {details}")]
    Inference { details: String },

    #[error("Region {region} lies outside the {width}x{height} frame")]
    RegionOutOfBounds {
        region: String,
        width: u32,
        height: u32,
    },

    #[error("Signature length {actual} does not match expected {expected}")]
    SignatureLength { expected: usize, actual: usize },

    #[error("No face found in {source_name}")]
    NoFace { source_name: String },
}

/// Event bus failures
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Receiver lagged behind by {count} events")]
    Lagged { count: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, FacewatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_error_recoverability() {
        assert!(CameraError::ReadFailed {
            details: "short read".to_string()
        }
        .is_recoverable());
        assert!(CameraError::FrameTimeout {
            timeout: Duration::from_millis(500)
        }
        .is_recoverable());
        assert!(!CameraError::NoneAvailable {
            indices: vec![0, 1]
        }
        .is_recoverable());
    }

    #[test]
    fn test_top_level_recoverability() {
        let fatal = FacewatchError::from(CameraError::NoneAvailable {
            indices: vec![0, 1],
        });
        assert!(!fatal.is_recoverable());

        let storage = FacewatchError::from(StorageError::Closed);
        assert!(storage.is_recoverable());

        assert!(!FacewatchError::system("boom").is_recoverable());
    }

    #[test]
    fn test_component_error_message() {
        let err = FacewatchError::component("recorder", "disk full");
        assert_eq!(err.to_string(), "Component error in recorder: disk full");
    }
}
