use crate::approval::ApprovalRequest;
use crate::recovery::RecoveryAction;
use crate::task::TaskStatus;
use crate::SwarmResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a worker is doing right now, as shown to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerActivity {
    Idle,
    Working,
    WaitingApproval,
    Error,
}

/// Live status of one worker. The payload is advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStateUpdate {
    pub agent_id: String,
    pub status: WorkerActivity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_subtask_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_bubble: Option<String>,
}

/// Everything the orchestrator broadcasts to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    AgentState(AgentStateUpdate),
    TaskUpdated {
        task_id: Uuid,
        status: TaskStatus,
        progress: f64,
        total_cost: f64,
        current_agent_id: Option<String>,
    },
    ApprovalRequested {
        approval: ApprovalRequest,
    },
    ApprovalResolved {
        approval: ApprovalRequest,
    },
    RecoverySuggested {
        task_id: Uuid,
        subtask_id: Uuid,
        agent_id: String,
        recovery: RecoveryAction,
    },
}

/// Push channel for orchestration events.
///
/// Publishing is fire-and-forget from the orchestrator's point of view: an
/// `Err` is logged and never aborts a run.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: OrchestrationEvent) -> SwarmResult<()>;
}
