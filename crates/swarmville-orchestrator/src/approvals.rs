use chrono::Utc;
use std::collections::HashMap;
use swarmville_core::{ApprovalRequest, ApprovalStatus, SwarmError, SwarmResult};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Registry of approval requests raised by orchestration runs.
#[derive(Default)]
pub struct ApprovalBook {
    requests: RwLock<HashMap<Uuid, ApprovalRequest>>,
}

impl ApprovalBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, request: ApprovalRequest) {
        self.requests.write().await.insert(request.id, request);
    }

    pub async fn get(&self, id: Uuid) -> Option<ApprovalRequest> {
        self.requests.read().await.get(&id).cloned()
    }

    /// Pending requests, oldest first.
    pub async fn pending(&self) -> Vec<ApprovalRequest> {
        let mut pending: Vec<ApprovalRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| r.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending
    }

    /// The open request for a subtask, if any.
    pub async fn pending_for_subtask(&self, subtask_id: Uuid) -> Option<ApprovalRequest> {
        self.requests
            .read()
            .await
            .values()
            .find(|r| r.subtask_id == subtask_id && r.is_pending())
            .cloned()
    }

    /// Record a decision. Only pending requests can be decided.
    pub async fn resolve(&self, id: Uuid, approved: bool) -> SwarmResult<ApprovalRequest> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| SwarmError::approval_not_found(id))?;
        if !request.is_pending() {
            let operation = if approved { "approve" } else { "deny" };
            return Err(SwarmError::invalid_transition(id, request.status, operation));
        }
        request.status = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Denied
        };
        request.resolved_at = Some(Utc::now());
        Ok(request.clone())
    }
}
