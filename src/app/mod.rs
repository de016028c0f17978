mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::{CameraOpener, FacewatchOrchestrator, FacewatchOrchestratorBuilder};
pub use shutdown::ShutdownHandle;
pub use types::{ComponentState, RunSummary, ShutdownReason};
