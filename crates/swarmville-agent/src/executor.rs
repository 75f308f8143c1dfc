use crate::config::BackendConfig;
use crate::tools::{run_tool, select_tools, ToolOutcome};
use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};
use swarmville_core::{
    ErrorDescriptor, ErrorKind, HandoffContext, ResultFlag, SwarmResult, WorkerBackend,
    WorkerDescriptor, WorkerResult,
};
use tracing::{info, warn};

/// Worker backend that runs mock tools instead of calling a model.
///
/// Every tool the description calls for (and the worker holds) is run in
/// order. Results are deterministic for a given description, which keeps
/// demo runs and tests reproducible.
pub struct SimulatedBackend {
    config: BackendConfig,
}

impl SimulatedBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn run_tools(&self, tools: &[String], description: &str) -> Vec<ToolOutcome> {
        let mut outcomes = Vec::with_capacity(tools.len());
        for tool in tools {
            if self.config.tool_latency_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.tool_latency_ms)).await;
            }
            let forced = self.config.failing_tools.iter().any(|t| t == tool);
            outcomes.push(run_tool(tool, description, forced));
        }
        outcomes
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(BackendConfig::default())
    }
}

#[async_trait]
impl WorkerBackend for SimulatedBackend {
    async fn execute(
        &self,
        worker: &WorkerDescriptor,
        description: &str,
        context: Option<&HandoffContext>,
    ) -> SwarmResult<WorkerResult> {
        let start = Instant::now();
        let tools = select_tools(description, &worker.tools);
        info!(agent_id = %worker.id, tools = ?tools, "Executing subtask");

        let outcomes = self.run_tools(&tools, description).await;
        let cost = self.config.cost_per_tool_call * outcomes.len() as f64;
        let flags = collect_flags(&outcomes);

        let mut output = render_output(description, &outcomes);
        if let Some(previous) = context.and_then(|c| c.previous_summary.as_deref()) {
            output.push_str(&format!("\nBuilding on: {previous}"));
        }

        let used: Vec<String> = outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| o.tool.clone())
            .collect();

        let summary = if used.is_empty() {
            "Task analyzed but no tools were successfully executed.".to_string()
        } else {
            format!("Completed task using {}.", used.join(", "))
        };

        let result_context = json!({
            "agent": worker.id,
            "task": description,
            "tools": used,
        });

        let failed: Vec<&ToolOutcome> = outcomes.iter().filter(|o| !o.success).collect();
        let mut result = WorkerResult::success(output, summary)
            .with_cost(cost)
            .with_flags(flags)
            .with_context(result_context);
        result.tools_used = used;
        result.duration_seconds = start.elapsed().as_secs_f64();

        if let Some(first) = failed.first() {
            warn!(agent_id = %worker.id, tool = %first.tool, "Tool call failed");
            result.success = false;
            result.error = Some(ErrorDescriptor::new(
                ErrorKind::ToolFailure,
                first.error.clone().unwrap_or_else(|| format!("{} failed", first.tool)),
            ));
        }

        info!(
            agent_id = %worker.id,
            success = result.success,
            cost = result.cost_incurred,
            "Subtask execution finished"
        );
        Ok(result)
    }
}

fn render_output(description: &str, outcomes: &[ToolOutcome]) -> String {
    if outcomes.is_empty() {
        return format!("Analyzed task: {description}. No tools were executed.");
    }
    outcomes
        .iter()
        .map(|o| {
            if o.success {
                format!("{}: Completed successfully\n  Data: {}", o.tool, o.data)
            } else {
                format!(
                    "{}: Failed\n  Error: {}",
                    o.tool,
                    o.error.as_deref().unwrap_or("unknown")
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_flags(outcomes: &[ToolOutcome]) -> Vec<ResultFlag> {
    let mut flags = Vec::new();
    for outcome in outcomes {
        if !outcome.success {
            flags.push(ResultFlag::error(format!(
                "{} failed: {}",
                outcome.tool,
                outcome.error.as_deref().unwrap_or("unknown")
            )));
            continue;
        }
        if let Some(n) = outcome.data.get("vulnerabilities_count").and_then(|v| v.as_u64()) {
            if n > 0 {
                flags.push(ResultFlag::warning(format!(
                    "Security scan found {n} vulnerabilities"
                )));
            }
        }
        if let Some(n) = outcome.data.get("issues_count").and_then(|v| v.as_u64()) {
            if n > 2 {
                flags.push(ResultFlag::warning(format!("Code quality issues found: {n}")));
            }
        }
    }
    flags
}
