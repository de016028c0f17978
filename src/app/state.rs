use super::{ComponentState, FacewatchOrchestrator, RunSummary};
use std::collections::HashMap;
use tracing::debug;

impl FacewatchOrchestrator {
    /// Update component state
    pub(super) fn set_component_state(&mut self, component: &str, state: ComponentState) {
        debug!("Component '{}' state changed to: {:?}", component, state);
        self.component_states.insert(component.to_string(), state);
    }

    /// Get component state
    pub fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.get(component).cloned()
    }

    /// Get all component states
    pub fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.clone()
    }

    /// Counters so far
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }
}
