use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use swarmville_core::{AgentStateUpdate, WorkerActivity, WorkerDescriptor};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Cumulative counters for one worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerMetrics {
    pub subtasks_run: u64,
    pub failures: u64,
    pub cost: f64,
    pub busy_ms: u64,
}

/// Live state of one worker as shown to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerState {
    pub agent_id: String,
    pub status: WorkerActivity,
    pub current_action: Option<String>,
    pub current_subtask_id: Option<Uuid>,
    pub speech_bubble: Option<String>,
    pub metrics: WorkerMetrics,
}

impl WorkerState {
    fn idle(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            status: WorkerActivity::Idle,
            current_action: None,
            current_subtask_id: None,
            speech_bubble: None,
            metrics: WorkerMetrics::default(),
        }
    }

    /// The event payload for this state.
    pub fn as_update(&self) -> AgentStateUpdate {
        AgentStateUpdate {
            agent_id: self.agent_id.clone(),
            status: self.status,
            current_action: self.current_action.clone(),
            current_subtask_id: self.current_subtask_id,
            speech_bubble: self.speech_bubble.clone(),
        }
    }
}

/// Tracks state and metrics for every worker on the roster.
pub struct WorkerMonitor {
    states: Arc<RwLock<HashMap<String, WorkerState>>>,
    order: Vec<String>,
}

impl WorkerMonitor {
    pub fn new(roster: &[WorkerDescriptor]) -> Self {
        let states = roster
            .iter()
            .map(|w| (w.id.clone(), WorkerState::idle(&w.id)))
            .collect();
        Self {
            states: Arc::new(RwLock::new(states)),
            order: roster.iter().map(|w| w.id.clone()).collect(),
        }
    }

    /// Mark a worker as working on a subtask.
    pub async fn start_subtask(&self, agent_id: &str, subtask_id: Uuid, action: &str, bubble: String) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(agent_id) {
            state.status = WorkerActivity::Working;
            state.current_subtask_id = Some(subtask_id);
            state.current_action = Some(action.to_string());
            state.speech_bubble = Some(bubble);
        }
    }

    /// Mark a worker idle after a subtask and record its cost and duration.
    pub async fn finish_subtask(&self, agent_id: &str, success: bool, cost: f64, busy_ms: u64) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(agent_id) {
            state.metrics.subtasks_run += 1;
            state.metrics.cost += cost;
            state.metrics.busy_ms += busy_ms;
            if success {
                state.status = WorkerActivity::Idle;
            } else {
                state.metrics.failures += 1;
                state.status = WorkerActivity::Error;
            }
            state.current_action = None;
            state.current_subtask_id = None;
            state.speech_bubble = None;
        }
    }

    /// Mark a worker as waiting on a human decision.
    pub async fn waiting_for_approval(&self, agent_id: &str, subtask_id: Uuid, action: &str) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(agent_id) {
            state.status = WorkerActivity::WaitingApproval;
            state.current_subtask_id = Some(subtask_id);
            state.current_action = Some(action.to_string());
            state.speech_bubble = Some("Waiting for approval".to_string());
        }
    }

    /// Clear a worker back to idle without touching its metrics.
    pub async fn reset(&self, agent_id: &str) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(agent_id) {
            let metrics = std::mem::take(&mut state.metrics);
            *state = WorkerState::idle(agent_id);
            state.metrics = metrics;
        }
    }

    pub async fn get_state(&self, agent_id: &str) -> Option<WorkerState> {
        self.states.read().await.get(agent_id).cloned()
    }

    /// All worker states in roster order.
    pub async fn snapshot(&self) -> Vec<WorkerState> {
        let states = self.states.read().await;
        self.order
            .iter()
            .filter_map(|id| states.get(id).cloned())
            .collect()
    }

    /// Sum of all workers' metrics.
    pub async fn aggregate_metrics(&self) -> WorkerMetrics {
        let states = self.states.read().await;
        states
            .values()
            .fold(WorkerMetrics::default(), |mut total, state| {
                total.subtasks_run += state.metrics.subtasks_run;
                total.failures += state.metrics.failures;
                total.cost += state.metrics.cost;
                total.busy_ms += state.metrics.busy_ms;
                total
            })
    }

    /// Serialize the current state as JSON (for the WebSocket dashboard).
    pub async fn to_json(&self) -> serde_json::Value {
        let states = self.snapshot().await;
        let aggregate = self.aggregate_metrics().await;
        serde_json::json!({
            "agents": states,
            "aggregate": aggregate,
        })
    }
}
