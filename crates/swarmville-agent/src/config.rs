use serde::{Deserialize, Serialize};

/// Tuning knobs for the simulated worker backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Simulated latency of every tool call, in milliseconds.
    #[serde(default)]
    pub tool_latency_ms: u64,
    /// Flat cost charged per tool call.
    #[serde(default = "default_cost_per_tool_call")]
    pub cost_per_tool_call: f64,
    /// Tools that report failure when invoked (for failure drills).
    #[serde(default)]
    pub failing_tools: Vec<String>,
}

fn default_cost_per_tool_call() -> f64 {
    0.01
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            tool_latency_ms: 0,
            cost_per_tool_call: default_cost_per_tool_call(),
            failing_tools: Vec::new(),
        }
    }
}

impl BackendConfig {
    pub fn with_latency_ms(mut self, ms: u64) -> Self {
        self.tool_latency_ms = ms;
        self
    }

    pub fn with_failing_tool(mut self, tool: impl Into<String>) -> Self {
        self.failing_tools.push(tool.into());
        self
    }
}
