use crate::recovery::ErrorDescriptor;
use crate::SwarmResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A worker ("agent") on the roster. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub goal: String,
    /// Declared capability set (tool names).
    #[serde(default)]
    pub tools: Vec<String>,
    /// Model / cost-tier tag.
    #[serde(default = "default_model")]
    pub llm_model: String,
}

fn default_model() -> String {
    "gpt-4".to_string()
}

impl WorkerDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            goal: String::new(),
            tools: Vec::new(),
            llm_model: default_model(),
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = model.into();
        self
    }

    /// Whether the capability set is a superset of `required`.
    pub fn has_tools(&self, required: &[String]) -> bool {
        required.iter().all(|tool| self.tools.contains(tool))
    }

    /// Case-insensitive substring match of any keyword against role or name.
    pub fn matches_any(&self, keywords: &[&str]) -> bool {
        let role = self.role.to_lowercase();
        let name = self.name.to_lowercase();
        keywords
            .iter()
            .any(|kw| role.contains(kw) || name.contains(kw))
    }
}

/// Severity of an issue flagged by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    Error,
    Warning,
    Info,
}

/// An issue a worker surfaced alongside its output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFlag {
    #[serde(rename = "type")]
    pub kind: FlagKind,
    pub message: String,
}

impl ResultFlag {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlagKind::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: FlagKind::Warning,
            message: message.into(),
        }
    }
}

/// What a worker backend returns for one subtask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub success: bool,
    pub output: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub flags: Vec<ResultFlag>,
    /// Raw context the worker wants to pass along.
    #[serde(default)]
    pub context: Option<serde_json::Value>,
    #[serde(default)]
    pub tools_used: Vec<String>,
    pub cost_incurred: f64,
    pub duration_seconds: f64,
    /// Set when `success` is false and the cause is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

impl WorkerResult {
    /// A successful result with the given output and summary.
    pub fn success(output: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            summary: Some(summary.into()),
            flags: Vec::new(),
            context: None,
            tools_used: Vec::new(),
            cost_incurred: 0.0,
            duration_seconds: 0.0,
            error: None,
        }
    }

    /// A failed result in the same shape a backend would report it.
    pub fn failure(error: ErrorDescriptor) -> Self {
        let message = error.message_or_default().to_string();
        Self {
            success: false,
            output: None,
            summary: Some(format!("Execution failed: {message}")),
            flags: vec![ResultFlag::error(message)],
            context: None,
            tools_used: Vec::new(),
            cost_incurred: 0.0,
            duration_seconds: 0.0,
            error: Some(error),
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost_incurred = cost;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_flags(mut self, flags: Vec<ResultFlag>) -> Self {
        self.flags = flags;
        self
    }
}

/// Which fields of the previous result travel to the next worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffConfig {
    #[serde(default = "default_true")]
    pub include_output: bool,
    #[serde(default = "default_true")]
    pub include_summary: bool,
    #[serde(default = "default_true")]
    pub include_flags: bool,
    #[serde(default = "default_true")]
    pub include_context: bool,
}

fn default_true() -> bool {
    true
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            include_output: true,
            include_summary: true,
            include_flags: true,
            include_context: true,
        }
    }
}

/// Context handed to the next worker. Excluded fields are absent, not null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<ResultFlag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_context: Option<serde_json::Value>,
}

impl HandoffContext {
    /// True when no field was carried over.
    pub fn is_empty(&self) -> bool {
        self.previous_output.is_none()
            && self.previous_summary.is_none()
            && self.flags.is_none()
            && self.original_context.is_none()
    }
}

/// Executes one subtask on behalf of a worker.
///
/// Implementations may be slow and may fail; the orchestration loop treats
/// an `Err` exactly like a result with `success = false`.
#[async_trait]
pub trait WorkerBackend: Send + Sync {
    async fn execute(
        &self,
        worker: &WorkerDescriptor,
        description: &str,
        context: Option<&HandoffContext>,
    ) -> SwarmResult<WorkerResult>;
}
