use serde::{Deserialize, Serialize};
use swarmville_core::HandoffConfig;

/// Tuning for the orchestration loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Pause between subtasks, in milliseconds.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    /// Stop at subtasks that require approval until a decision arrives.
    #[serde(default)]
    pub enforce_approvals: bool,
    #[serde(default)]
    pub handoff: HandoffConfig,
    /// Buffer size of the event bus.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_step_delay_ms() -> u64 {
    500
}

fn default_event_capacity() -> usize {
    256
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay_ms(),
            enforce_approvals: false,
            handoff: HandoffConfig::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_step_delay_ms(mut self, ms: u64) -> Self {
        self.step_delay_ms = ms;
        self
    }

    pub fn with_approvals(mut self, enforce: bool) -> Self {
        self.enforce_approvals = enforce;
        self
    }

    pub fn with_handoff(mut self, handoff: HandoffConfig) -> Self {
        self.handoff = handoff;
        self
    }
}
