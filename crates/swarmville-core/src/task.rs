use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet picked up by an orchestration run.
    Pending,
    /// Owned by an orchestration run (or waiting on an approval).
    Running,
    /// Stopped at a subtask boundary by an external request.
    Paused,
    /// All subtasks reached a terminal state.
    Completed,
    /// The orchestration run itself faulted.
    Failed,
}

impl TaskStatus {
    /// `Completed` and `Failed` are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Paused => write!(f, "paused"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle status of a [`Subtask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Running,
    WaitingApproval,
    Completed,
    Failed,
}

impl SubtaskStatus {
    /// `Completed` and `Failed` are final.
    pub fn is_terminal(self) -> bool {
        matches!(self, SubtaskStatus::Completed | SubtaskStatus::Failed)
    }
}

impl std::fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtaskStatus::Pending => write!(f, "pending"),
            SubtaskStatus::Running => write!(f, "running"),
            SubtaskStatus::WaitingApproval => write!(f, "waiting_approval"),
            SubtaskStatus::Completed => write!(f, "completed"),
            SubtaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One step of a task, bound to a single worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub task_id: Uuid,
    pub agent_id: String,
    pub description: String,
    pub status: SubtaskStatus,
    pub output: Option<String>,
    pub cost_incurred: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Resource names this subtask claims while running.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    /// Tools a worker must hold to take this subtask over.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_tools: Vec<String>,
}

impl Subtask {
    pub fn new(task_id: Uuid, agent_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            agent_id: agent_id.into(),
            description: description.into(),
            status: SubtaskStatus::Pending,
            output: None,
            cost_incurred: 0.0,
            started_at: None,
            completed_at: None,
            resources: Vec::new(),
            required_tools: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resources: Vec<String>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_required_tools(mut self, tools: Vec<String>) -> Self {
        self.required_tools = tools;
        self
    }
}

/// A high-level unit of work split into an ordered chain of subtasks.
///
/// `progress == 100` holds exactly when `status` is `Completed`, and the
/// order of `subtasks` is fixed once decomposition has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: String,
    pub workflow_id: String,
    pub description: String,
    pub status: TaskStatus,
    pub current_agent_id: Option<String>,
    pub progress: f64,
    pub total_cost: f64,
    pub subtasks: Vec<Subtask>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Bumped by the store on every accepted replace.
    #[serde(default)]
    pub revision: u64,
}

impl Task {
    pub fn new(
        user_id: impl Into<String>,
        workflow_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            workflow_id: workflow_id.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            current_agent_id: None,
            progress: 0.0,
            total_cost: 0.0,
            subtasks: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
            revision: 0,
        }
    }

    /// Index of the first subtask that has not reached a terminal state.
    pub fn first_open_subtask(&self) -> Option<usize> {
        self.subtasks.iter().position(|s| !s.status.is_terminal())
    }

    pub fn subtask(&self, subtask_id: Uuid) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == subtask_id)
    }

    pub fn subtask_mut(&mut self, subtask_id: Uuid) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| s.id == subtask_id)
    }

    /// Whether every subtask is `Completed` or `Failed`.
    pub fn all_subtasks_terminal(&self) -> bool {
        self.subtasks.iter().all(|s| s.status.is_terminal())
    }

    /// Move into a terminal status, stamping `completed_at` only once.
    pub fn finish(&mut self, status: TaskStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        if status == TaskStatus::Completed {
            self.progress = 100.0;
        }
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }
}

/// Kind of conflict between concurrently active subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    ResourceConflict,
}

/// A detected conflict, produced for reporting only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub resource: String,
    pub agents: Vec<String>,
    pub message: String,
}
