//! REST handlers for tasks, workers, approvals and conflicts.

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use swarmville_agent::cost_per_1k_tokens;
use swarmville_core::{ApprovalRequest, Conflict, SwarmError, Task};
use swarmville_orchestrator::ReassignRequest;
use uuid::Uuid;

const DEFAULT_USER: &str = "demo_user";

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_workflow() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default = "default_user")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTask {
    #[serde(default = "default_user")]
    pub user_id: String,
    #[serde(default = "default_workflow")]
    pub workflow_id: String,
    pub description: String,
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.orchestrator.list(&query.user_id).await?))
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let description = body.description.trim();
    if description.is_empty() {
        return Err(ApiError::BadRequest("description must not be empty".into()));
    }
    let (task, _run) = state
        .orchestrator
        .submit(&body.user_id, &body.workflow_id, description)
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.orchestrator.get(id).await?))
}

pub async fn pause_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.orchestrator.pause(id).await?))
}

pub async fn resume_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    let (task, _run) = state.orchestrator.resume(id).await?;
    Ok(Json(task))
}

pub async fn reassign_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ReassignRequest>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.orchestrator.reassign_with(id, body).await?))
}

/// The roster, annotated with each worker's model price.
pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<Value>> {
    let agents = state
        .orchestrator
        .roster()
        .iter()
        .map(|worker| {
            json!({
                "id": worker.id,
                "name": worker.name,
                "role": worker.role,
                "goal": worker.goal,
                "tools": worker.tools,
                "llm_model": worker.llm_model,
                "cost_per_1k_tokens": cost_per_1k_tokens(&worker.llm_model),
            })
        })
        .collect();
    Json(agents)
}

pub async fn agent_states(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.orchestrator.monitor().to_json().await)
}

pub async fn list_approvals(State(state): State<Arc<AppState>>) -> Json<Vec<ApprovalRequest>> {
    Json(state.orchestrator.approvals().pending().await)
}

pub async fn get_approval(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApprovalRequest>> {
    state
        .orchestrator
        .approvals()
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| SwarmError::approval_not_found(id).into())
}

pub async fn approve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApprovalRequest>> {
    let (approval, _run) = state.orchestrator.decide_approval(id, true).await?;
    Ok(Json(approval))
}

pub async fn deny(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApprovalRequest>> {
    let (approval, _run) = state.orchestrator.decide_approval(id, false).await?;
    Ok(Json(approval))
}

pub async fn list_conflicts(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Conflict>>> {
    Ok(Json(state.orchestrator.active_conflicts().await?))
}
