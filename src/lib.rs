pub mod config;
pub mod error;
pub mod events;
pub mod recovery;
pub mod frame;
pub mod camera;
pub mod recognition;
pub mod storage;
pub mod alerting;
pub mod hardware;
pub mod annotation;
pub mod preview;
pub mod keyboard_input;
pub mod app;

pub use config::FacewatchConfig;
pub use error::{FacewatchError, Result};
pub use recovery::{RecoveryAction, RecoveryManager};
pub use app::{
    CameraOpener, ComponentState, FacewatchOrchestrator, FacewatchOrchestratorBuilder, RunSummary,
    ShutdownHandle, ShutdownReason,
};
pub use events::{EventBus, FacewatchEvent};
pub use frame::{FaceRegion, Frame};
pub use camera::FrameSource;
pub use recognition::{MatchResult, RecognitionPipeline, Signature};
pub use storage::SqliteStore;
pub use alerting::{AlertDecision, AlertStateMachine, EventRecorder};
pub use hardware::{AlertDriver, MotionSensor, OutputPin, TextDisplay};
