//! Motion window, cooldown and alert recording

mod cooldown;
pub mod recorder;
mod state_machine;
mod window;

pub use cooldown::{AlertDecision, CooldownTable};
pub use recorder::{EventRecorder, RecordOutcome};
pub use state_machine::{AlertStateMachine, DetectorState};
pub use window::{DetectionWindow, WindowTransition};
