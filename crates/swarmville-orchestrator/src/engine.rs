use crate::approvals::ApprovalBook;
use crate::config::OrchestratorConfig;
use crate::conflict;
use crate::decompose::decompose;
use crate::handoff;
use crate::monitor::WorkerMonitor;
use crate::recovery::recover;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use swarmville_core::{
    ApprovalRequest, Conflict, ErrorDescriptor, ErrorKind, EventSink, OrchestrationEvent,
    RecoveryAction, Subtask, SubtaskStatus, SwarmError, SwarmResult, Task, TaskStatus, TaskStore,
    WorkerBackend, WorkerDescriptor, WorkerResult,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Attempts at a compare-and-replace before the run gives up.
const MAX_REPLACE_ATTEMPTS: usize = 16;

/// Characters of a subtask description shown in a speech bubble.
const BUBBLE_CHARS: usize = 50;

/// Handle to a spawned orchestration run.
pub type RunHandle = JoinHandle<SwarmResult<RunOutcome>>;

/// How a call to [`Orchestrator::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// No task with that id.
    NotFound,
    /// Another run owns the task; this call did nothing.
    AlreadyRunning,
    /// Stopped at a subtask boundary (or never started) because the task is paused.
    Paused,
    /// Every subtask is terminal and the task is complete.
    Completed,
    /// The task had already failed.
    Failed,
    /// Stopped in front of a subtask that needs a human decision.
    AwaitingApproval { subtask_id: Uuid },
}

impl RunOutcome {
    fn for_status(status: TaskStatus) -> Option<Self> {
        match status {
            TaskStatus::Paused => Some(RunOutcome::Paused),
            TaskStatus::Completed => Some(RunOutcome::Completed),
            TaskStatus::Failed => Some(RunOutcome::Failed),
            TaskStatus::Pending | TaskStatus::Running => None,
        }
    }
}

/// Body of a reassignment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignRequest {
    pub new_agent_id: String,
    /// Hand the previous result to the new worker when its subtask starts.
    #[serde(default = "default_transfer_context")]
    pub transfer_context: bool,
}

fn default_transfer_context() -> bool {
    true
}

impl ReassignRequest {
    pub fn new(new_agent_id: impl Into<String>) -> Self {
        Self {
            new_agent_id: new_agent_id.into(),
            transfer_context: true,
        }
    }

    pub fn without_context(mut self) -> Self {
        self.transfer_context = false;
        self
    }
}

/// Per-task bookkeeping that is not part of the persisted task.
#[derive(Debug, Default)]
struct Plan {
    weights: HashMap<Uuid, u32>,
    gated: HashSet<Uuid>,
    approved: HashSet<Uuid>,
    /// Subtasks that must start without a handoff context.
    fresh_context: HashSet<Uuid>,
    last_result: Option<WorkerResult>,
}

/// Task ids with a live run, and whether another run was asked for meanwhile.
#[derive(Default)]
struct ActiveRuns {
    runs: Mutex<HashMap<Uuid, bool>>,
}

impl ActiveRuns {
    fn try_claim(&self, task_id: Uuid) -> Option<RunClaim<'_>> {
        let mut runs = self.runs.lock();
        if let Some(rerun) = runs.get_mut(&task_id) {
            *rerun = true;
            return None;
        }
        runs.insert(task_id, false);
        Some(RunClaim {
            runs: self,
            task_id,
            released: false,
        })
    }
}

/// Exclusive ownership of a task's run. Released on drop.
struct RunClaim<'a> {
    runs: &'a ActiveRuns,
    task_id: Uuid,
    released: bool,
}

impl RunClaim<'_> {
    /// Consume a pending rerun request, or release the claim if there is none.
    fn rerun_or_release(&mut self) -> bool {
        let mut runs = self.runs.runs.lock();
        if runs.get(&self.task_id).copied().unwrap_or(false) {
            runs.insert(self.task_id, false);
            return true;
        }
        runs.remove(&self.task_id);
        self.released = true;
        false
    }
}

impl Drop for RunClaim<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.runs.runs.lock().remove(&self.task_id);
        }
    }
}

/// The task orchestration engine.
///
/// Owns the worker roster and drives each task through its subtask chain:
/// decomposition on first run, one subtask at a time, handoff between
/// workers, progress and cost accounting, and the pause / resume /
/// reassign / approval transitions. Every write to a task is a whole-value
/// compare-and-replace against the [`TaskStore`].
pub struct Orchestrator {
    store: Arc<dyn TaskStore>,
    backend: Arc<dyn WorkerBackend>,
    events: Arc<dyn EventSink>,
    roster: Vec<WorkerDescriptor>,
    config: OrchestratorConfig,
    monitor: Arc<WorkerMonitor>,
    approvals: Arc<ApprovalBook>,
    plans: Mutex<HashMap<Uuid, Plan>>,
    active: ActiveRuns,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn TaskStore>,
        backend: Arc<dyn WorkerBackend>,
        events: Arc<dyn EventSink>,
        roster: Vec<WorkerDescriptor>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            monitor: Arc::new(WorkerMonitor::new(&roster)),
            approvals: Arc::new(ApprovalBook::new()),
            plans: Mutex::new(HashMap::new()),
            active: ActiveRuns::default(),
            store,
            backend,
            events,
            roster,
            config,
        }
    }

    pub fn roster(&self) -> &[WorkerDescriptor] {
        &self.roster
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn monitor(&self) -> &Arc<WorkerMonitor> {
        &self.monitor
    }

    pub fn approvals(&self) -> &Arc<ApprovalBook> {
        &self.approvals
    }

    pub fn worker(&self, agent_id: &str) -> Option<&WorkerDescriptor> {
        self.roster.iter().find(|w| w.id == agent_id)
    }

    // -----------------------------------------------------------------------
    // Submission and queries
    // -----------------------------------------------------------------------

    /// Create a task and start running it in the background.
    pub async fn submit(
        self: &Arc<Self>,
        user_id: &str,
        workflow_id: &str,
        description: &str,
    ) -> SwarmResult<(Task, RunHandle)> {
        let task = Task::new(user_id, workflow_id, description);
        self.store.insert(task.clone()).await?;
        info!(task_id = %task.id, user_id = %user_id, "Task submitted");
        let handle = self.spawn_run(task.id);
        Ok((task, handle))
    }

    pub async fn get(&self, task_id: Uuid) -> SwarmResult<Task> {
        self.store
            .get(task_id)
            .await?
            .ok_or_else(|| SwarmError::task_not_found(task_id))
    }

    /// Tasks of one user, oldest first.
    pub async fn list(&self, user_id: &str) -> SwarmResult<Vec<Task>> {
        self.store.list_by_user(user_id).await
    }

    /// Resource conflicts among subtasks currently running in any task.
    pub async fn active_conflicts(&self) -> SwarmResult<Vec<Conflict>> {
        let running: Vec<Subtask> = self
            .store
            .list()
            .await?
            .into_iter()
            .flat_map(|t| t.subtasks)
            .filter(|s| s.status == SubtaskStatus::Running)
            .collect();
        Ok(conflict::detect(&running))
    }

    // -----------------------------------------------------------------------
    // The orchestration loop
    // -----------------------------------------------------------------------

    /// Start [`run`](Self::run) on the runtime.
    pub fn spawn_run(self: &Arc<Self>, task_id: Uuid) -> RunHandle {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(task_id).await })
    }

    /// Drive a task until it completes, pauses or waits on an approval.
    ///
    /// At most one run per task id is live at a time; a call that finds the
    /// task already owned returns [`RunOutcome::AlreadyRunning`] and makes
    /// the owner take another pass before it lets go.
    pub async fn run(&self, task_id: Uuid) -> SwarmResult<RunOutcome> {
        let Some(mut claim) = self.active.try_claim(task_id) else {
            debug!(task_id = %task_id, "Run already active");
            return Ok(RunOutcome::AlreadyRunning);
        };

        loop {
            let outcome = match self.drive(task_id).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(task_id = %task_id, error = %err, "Orchestration fault");
                    self.fail_task(task_id).await;
                    return Err(err);
                }
            };
            if !claim.rerun_or_release() {
                return Ok(outcome);
            }
            debug!(task_id = %task_id, "Rerun requested while running");
        }
    }

    async fn drive(&self, task_id: Uuid) -> SwarmResult<RunOutcome> {
        let Some(task) = self.store.get(task_id).await? else {
            return Ok(RunOutcome::NotFound);
        };
        if let Some(outcome) = RunOutcome::for_status(task.status) {
            return Ok(outcome);
        }

        let start = Instant::now();
        let mut task = self
            .mutate(task_id, |t| {
                if t.status != TaskStatus::Pending {
                    return Ok(false);
                }
                t.status = TaskStatus::Running;
                Ok(true)
            })
            .await?;
        if let Some(outcome) = RunOutcome::for_status(task.status) {
            return Ok(outcome);
        }

        // Phase 1: plan once
        if task.subtasks.is_empty() {
            task = self.plan(task).await?;
            if task.status == TaskStatus::Completed {
                return Ok(RunOutcome::Completed);
            }
        }

        info!(
            task_id = %task_id,
            subtasks = task.subtasks.len(),
            progress = task.progress,
            "Task running"
        );

        // Phase 2: one subtask per iteration, pause checked at the top
        loop {
            let task = self.load(task_id).await?;
            if let Some(outcome) = RunOutcome::for_status(task.status) {
                if outcome == RunOutcome::Paused {
                    info!(task_id = %task_id, progress = task.progress, "Task paused");
                }
                return Ok(outcome);
            }

            let Some(index) = task.first_open_subtask() else {
                let task = self.complete(task_id).await?;
                return Ok(RunOutcome::for_status(task.status).unwrap_or(RunOutcome::Completed));
            };
            let subtask = &task.subtasks[index];

            if subtask.status == SubtaskStatus::WaitingApproval {
                return Ok(RunOutcome::AwaitingApproval {
                    subtask_id: subtask.id,
                });
            }
            if self.needs_approval(task_id, subtask.id) {
                self.request_approval(task_id, subtask.id).await?;
                return Ok(RunOutcome::AwaitingApproval {
                    subtask_id: subtask.id,
                });
            }

            let task = self.execute_step(task_id, subtask.id).await?;
            if task.status == TaskStatus::Paused {
                continue;
            }
            if task.status == TaskStatus::Completed {
                info!(
                    task_id = %task_id,
                    total_cost = task.total_cost,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Task completed"
                );
                return Ok(RunOutcome::Completed);
            }

            if self.config.step_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.step_delay_ms)).await;
            }
        }
    }

    /// Decompose the task and persist its subtasks.
    async fn plan(&self, task: Task) -> SwarmResult<Task> {
        let specs = decompose(&task.description, &self.roster);
        let mut plan = Plan::default();
        let subtasks: Vec<Subtask> = specs
            .iter()
            .map(|spec| {
                let subtask = Subtask::new(task.id, &spec.agent_id, &spec.description)
                    .with_resources(spec.resources.clone())
                    .with_required_tools(spec.required_tools.clone());
                plan.weights.insert(subtask.id, spec.weight);
                if spec.requires_approval {
                    plan.gated.insert(subtask.id);
                }
                subtask
            })
            .collect();
        let total_weight: u32 = specs.iter().map(|s| s.weight).sum();
        self.plans.lock().insert(task.id, plan);

        let task = self
            .mutate(task.id, |t| {
                if !t.subtasks.is_empty() {
                    return Ok(false);
                }
                t.subtasks = subtasks.clone();
                if total_weight == 0 {
                    t.finish(TaskStatus::Completed);
                }
                Ok(true)
            })
            .await?;

        info!(
            task_id = %task.id,
            subtasks = task.subtasks.len(),
            total_weight,
            "Task decomposed"
        );
        if task.status == TaskStatus::Completed {
            info!(task_id = %task.id, "Nothing to do, task completed");
            self.forget_if_finished(&task);
            self.publish_task(&task).await;
        }
        Ok(task)
    }

    /// Run one subtask and record its result.
    async fn execute_step(&self, task_id: Uuid, subtask_id: Uuid) -> SwarmResult<Task> {
        let task = self
            .mutate(task_id, |t| {
                // A pause accepted since the loop-top check wins over starting
                if t.status != TaskStatus::Running {
                    return Ok(false);
                }
                let subtask = t
                    .subtask_mut(subtask_id)
                    .ok_or_else(|| SwarmError::subtask_not_found(subtask_id))?;
                subtask.status = SubtaskStatus::Running;
                subtask.started_at = Some(Utc::now());
                let agent_id = subtask.agent_id.clone();
                t.current_agent_id = Some(agent_id);
                Ok(true)
            })
            .await?;
        if task.status != TaskStatus::Running {
            debug!(task_id = %task_id, status = %task.status, "Subtask not started");
            return Ok(task);
        }
        let subtask = task
            .subtask(subtask_id)
            .cloned()
            .ok_or_else(|| SwarmError::subtask_not_found(subtask_id))?;

        let Some(worker) = self.worker(&subtask.agent_id).cloned() else {
            warn!(
                task_id = %task_id,
                worker = %subtask.agent_id,
                "Subtask bound to a worker outside the roster"
            );
            let err = SwarmError::SubtaskExecution(
                SwarmError::worker_not_found(&subtask.agent_id).to_string(),
            );
            return self
                .record_result(task_id, &subtask, WorkerResult::failure((&err).into()), 0)
                .await;
        };

        let action: String = subtask.description.chars().take(BUBBLE_CHARS).collect();
        let bubble = format!("Working on: {action}...");
        self.monitor
            .start_subtask(&worker.id, subtask.id, &subtask.description, bubble)
            .await;
        self.publish_worker(&worker.id).await;
        self.publish_task(&task).await;
        info!(
            task_id = %task_id,
            subtask_id = %subtask.id,
            worker = %worker.id,
            "Subtask started"
        );

        let context = {
            let mut plans = self.plans.lock();
            let plan = plans.entry(task_id).or_default();
            let fresh = plan.fresh_context.remove(&subtask.id);
            match (&plan.last_result, fresh) {
                (Some(previous), false) => Some(handoff::build(previous, &self.config.handoff)),
                _ => None,
            }
        };

        let started = Instant::now();
        let backend = Arc::clone(&self.backend);
        let description = subtask.description.clone();
        let executing = worker.clone();
        let joined = tokio::spawn(async move {
            backend
                .execute(&executing, &description, context.as_ref())
                .await
        })
        .await;

        let result = match joined {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(task_id = %task_id, worker = %worker.id, error = %err, "Worker backend error");
                WorkerResult::failure((&err).into())
            }
            Err(join_err) => {
                warn!(task_id = %task_id, worker = %worker.id, error = %join_err, "Worker backend aborted");
                WorkerResult::failure(ErrorDescriptor::new(
                    ErrorKind::Unknown,
                    format!("Worker backend aborted: {join_err}"),
                ))
            }
        };
        let busy_ms = started.elapsed().as_millis() as u64;

        self.record_result(task_id, &subtask, result, busy_ms).await
    }

    async fn record_result(
        &self,
        task_id: Uuid,
        subtask: &Subtask,
        result: WorkerResult,
        busy_ms: u64,
    ) -> SwarmResult<Task> {
        let weights = self.weights(task_id);
        let status = if result.success {
            SubtaskStatus::Completed
        } else {
            SubtaskStatus::Failed
        };
        let output = result.output.clone().or_else(|| result.summary.clone());

        let task = self
            .mutate(task_id, |t| {
                let stored = t
                    .subtask_mut(subtask.id)
                    .ok_or_else(|| SwarmError::subtask_not_found(subtask.id))?;
                stored.status = status;
                stored.completed_at = Some(Utc::now());
                stored.output = output.clone();
                stored.cost_incurred = result.cost_incurred;
                t.total_cost += result.cost_incurred;
                settle(t, &weights);
                Ok(true)
            })
            .await?;

        info!(
            task_id = %task_id,
            subtask_id = %subtask.id,
            worker = %subtask.agent_id,
            success = result.success,
            progress = task.progress,
            cost = result.cost_incurred,
            "Subtask finished"
        );

        self.monitor
            .finish_subtask(&subtask.agent_id, result.success, result.cost_incurred, busy_ms)
            .await;
        self.publish_worker(&subtask.agent_id).await;
        self.publish_task(&task).await;

        if !result.success {
            self.suggest_recovery(&task, subtask, &result).await;
        }
        if task.status.is_terminal() {
            self.forget_if_finished(&task);
        } else {
            self.plans.lock().entry(task_id).or_default().last_result = Some(result);
        }
        Ok(task)
    }

    /// Ask the recovery policy what to do and broadcast its answer.
    async fn suggest_recovery(&self, task: &Task, subtask: &Subtask, result: &WorkerResult) {
        let error = result.error.clone().unwrap_or_else(|| {
            ErrorDescriptor::new(
                ErrorKind::Unknown,
                result
                    .summary
                    .clone()
                    .unwrap_or_else(|| "Subtask failed".to_string()),
            )
        });
        let failed = task.subtask(subtask.id).unwrap_or(subtask);
        let recovery: RecoveryAction = recover(&error, failed, &self.roster);
        info!(
            task_id = %task.id,
            subtask_id = %subtask.id,
            recovery = ?recovery,
            "Recovery suggested"
        );
        self.publish(OrchestrationEvent::RecoverySuggested {
            task_id: task.id,
            subtask_id: subtask.id,
            agent_id: subtask.agent_id.clone(),
            recovery,
        })
        .await;
    }

    /// Mark the task complete once every subtask is terminal.
    async fn complete(&self, task_id: Uuid) -> SwarmResult<Task> {
        let weights = self.weights(task_id);
        let task = self
            .mutate(task_id, |t| {
                if t.status.is_terminal() || !t.all_subtasks_terminal() {
                    return Ok(false);
                }
                settle(t, &weights);
                Ok(true)
            })
            .await?;
        self.forget_if_finished(&task);
        self.publish_task(&task).await;
        Ok(task)
    }

    // -----------------------------------------------------------------------
    // Approvals
    // -----------------------------------------------------------------------

    fn needs_approval(&self, task_id: Uuid, subtask_id: Uuid) -> bool {
        if !self.config.enforce_approvals {
            return false;
        }
        self.plans
            .lock()
            .get(&task_id)
            .is_some_and(|p| p.gated.contains(&subtask_id) && !p.approved.contains(&subtask_id))
    }

    async fn request_approval(&self, task_id: Uuid, subtask_id: Uuid) -> SwarmResult<()> {
        let task = self
            .mutate(task_id, |t| {
                let subtask = t
                    .subtask_mut(subtask_id)
                    .ok_or_else(|| SwarmError::subtask_not_found(subtask_id))?;
                subtask.status = SubtaskStatus::WaitingApproval;
                let agent_id = subtask.agent_id.clone();
                t.current_agent_id = Some(agent_id);
                Ok(true)
            })
            .await?;
        let subtask = task
            .subtask(subtask_id)
            .ok_or_else(|| SwarmError::subtask_not_found(subtask_id))?;

        let approval = ApprovalRequest::new(
            task_id,
            subtask_id,
            &subtask.agent_id,
            &subtask.description,
            "This step changes a shared environment and needs sign-off",
        );
        self.approvals.open(approval.clone()).await;
        self.monitor
            .waiting_for_approval(&subtask.agent_id, subtask_id, &subtask.description)
            .await;

        info!(
            task_id = %task_id,
            subtask_id = %subtask_id,
            approval_id = %approval.id,
            "Waiting for approval"
        );
        self.publish_worker(&subtask.agent_id).await;
        self.publish(OrchestrationEvent::ApprovalRequested { approval })
            .await;
        Ok(())
    }

    /// Record a human decision on an approval and continue the task.
    pub async fn decide_approval(
        self: &Arc<Self>,
        approval_id: Uuid,
        approved: bool,
    ) -> SwarmResult<(ApprovalRequest, RunHandle)> {
        let approval = self.approvals.resolve(approval_id, approved).await?;
        info!(
            approval_id = %approval_id,
            task_id = %approval.task_id,
            approved,
            "Approval decided"
        );
        self.publish(OrchestrationEvent::ApprovalResolved {
            approval: approval.clone(),
        })
        .await;
        let (_, handle) = self
            .resume_from_approval(approval.task_id, approval.subtask_id, approved)
            .await?;
        Ok((approval, handle))
    }

    /// Release a subtask held in `WaitingApproval` and re-invoke the loop.
    ///
    /// Approved subtasks go back to `Pending` and are not gated again;
    /// denied ones fail with "Approval denied" and count toward progress.
    pub async fn resume_from_approval(
        self: &Arc<Self>,
        task_id: Uuid,
        subtask_id: Uuid,
        approved: bool,
    ) -> SwarmResult<(Task, RunHandle)> {
        let weights = self.weights(task_id);
        let task = self
            .mutate(task_id, |t| {
                let subtask = t
                    .subtask_mut(subtask_id)
                    .ok_or_else(|| SwarmError::subtask_not_found(subtask_id))?;
                if subtask.status != SubtaskStatus::WaitingApproval {
                    return Err(SwarmError::invalid_transition(
                        subtask_id,
                        subtask.status,
                        "resume from approval",
                    ));
                }
                if approved {
                    subtask.status = SubtaskStatus::Pending;
                } else {
                    subtask.status = SubtaskStatus::Failed;
                    subtask.output = Some("Approval denied".to_string());
                    subtask.completed_at = Some(Utc::now());
                }
                settle(t, &weights);
                Ok(true)
            })
            .await?;
        if approved {
            self.plans
                .lock()
                .entry(task_id)
                .or_default()
                .approved
                .insert(subtask_id);
        }
        self.forget_if_finished(&task);

        if let Some(subtask) = task.subtask(subtask_id) {
            self.monitor.reset(&subtask.agent_id).await;
            self.publish_worker(&subtask.agent_id).await;
        }
        self.publish_task(&task).await;
        let handle = self.spawn_run(task_id);
        Ok((task, handle))
    }

    // -----------------------------------------------------------------------
    // External transitions
    // -----------------------------------------------------------------------

    /// Stop the task at the next subtask boundary. Only from `Running`.
    pub async fn pause(&self, task_id: Uuid) -> SwarmResult<Task> {
        let task = self
            .mutate(task_id, |t| {
                if t.status != TaskStatus::Running {
                    return Err(SwarmError::invalid_transition(t.id, t.status, "pause"));
                }
                t.status = TaskStatus::Paused;
                Ok(true)
            })
            .await?;
        info!(task_id = %task_id, "Pause requested");
        self.publish_task(&task).await;
        Ok(task)
    }

    /// Continue a paused task from its first open subtask. Only from `Paused`.
    pub async fn resume(self: &Arc<Self>, task_id: Uuid) -> SwarmResult<(Task, RunHandle)> {
        let task = self
            .mutate(task_id, |t| {
                if t.status != TaskStatus::Paused {
                    return Err(SwarmError::invalid_transition(t.id, t.status, "resume"));
                }
                t.status = TaskStatus::Running;
                Ok(true)
            })
            .await?;
        info!(task_id = %task_id, progress = task.progress, "Task resumed");
        self.publish_task(&task).await;
        let handle = self.spawn_run(task_id);
        Ok((task, handle))
    }

    /// Hand the task to another worker, carrying the previous result over.
    pub async fn reassign(&self, task_id: Uuid, new_agent_id: &str) -> SwarmResult<Task> {
        self.reassign_with(task_id, ReassignRequest::new(new_agent_id))
            .await
    }

    /// Hand the task to another worker. Only from `Running` or `Paused`.
    ///
    /// Completed subtasks keep their worker; the next subtask that has not
    /// started is re-bound to the new one.
    pub async fn reassign_with(&self, task_id: Uuid, request: ReassignRequest) -> SwarmResult<Task> {
        let worker_id = self
            .worker(&request.new_agent_id)
            .map(|w| w.id.clone())
            .ok_or_else(|| SwarmError::worker_not_found(&request.new_agent_id))?;

        let mut rebound = None;
        let task = self
            .mutate(task_id, |t| {
                if !matches!(t.status, TaskStatus::Running | TaskStatus::Paused) {
                    return Err(SwarmError::invalid_transition(t.id, t.status, "reassign"));
                }
                t.current_agent_id = Some(worker_id.clone());
                rebound = t
                    .subtasks
                    .iter_mut()
                    .find(|s| !s.status.is_terminal() && s.status != SubtaskStatus::Running)
                    .map(|s| {
                        s.agent_id = worker_id.clone();
                        s.id
                    });
                Ok(true)
            })
            .await?;

        if let Some(subtask_id) = rebound {
            let mut plans = self.plans.lock();
            let plan = plans.entry(task_id).or_default();
            if request.transfer_context {
                plan.fresh_context.remove(&subtask_id);
            } else {
                plan.fresh_context.insert(subtask_id);
            }
        }

        info!(
            task_id = %task_id,
            worker = %worker_id,
            transfer_context = request.transfer_context,
            "Task reassigned"
        );
        self.publish_task(&task).await;
        Ok(task)
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    async fn load(&self, task_id: Uuid) -> SwarmResult<Task> {
        self.store
            .get(task_id)
            .await?
            .ok_or_else(|| SwarmError::task_not_found(task_id))
    }

    /// Apply `apply` to a fresh copy of the task and swap it in atomically.
    ///
    /// `apply` returns `false` to leave the task untouched. It is re-run
    /// against the latest copy whenever another writer got there first.
    async fn mutate<F>(&self, task_id: Uuid, mut apply: F) -> SwarmResult<Task>
    where
        F: FnMut(&mut Task) -> SwarmResult<bool> + Send,
    {
        for attempt in 1..=MAX_REPLACE_ATTEMPTS {
            let current = self.load(task_id).await?;
            let mut next = current.clone();
            if !apply(&mut next)? {
                return Ok(current);
            }
            if self
                .store
                .compare_and_replace(next.clone(), current.revision)
                .await?
            {
                next.revision = current.revision + 1;
                return Ok(next);
            }
            debug!(task_id = %task_id, attempt, "Task changed during update, retrying");
        }
        Err(SwarmError::OrchestrationFault(format!(
            "task {task_id} kept changing during update"
        )))
    }

    async fn fail_task(&self, task_id: Uuid) {
        let failed = self
            .mutate(task_id, |t| {
                if t.status.is_terminal() {
                    return Ok(false);
                }
                t.finish(TaskStatus::Failed);
                Ok(true)
            })
            .await;
        match failed {
            Ok(task) => {
                self.forget_if_finished(&task);
                self.publish_task(&task).await;
            }
            Err(err) => error!(task_id = %task_id, error = %err, "Could not mark task failed"),
        }
    }

    /// Drop the plan of a task that can no longer run.
    fn forget_if_finished(&self, task: &Task) {
        if task.status.is_terminal() && self.plans.lock().remove(&task.id).is_some() {
            debug!(task_id = %task.id, "Plan released");
        }
    }

    fn weights(&self, task_id: Uuid) -> HashMap<Uuid, u32> {
        self.plans
            .lock()
            .get(&task_id)
            .map(|p| p.weights.clone())
            .unwrap_or_default()
    }

    async fn publish(&self, event: OrchestrationEvent) {
        if let Err(err) = self.events.publish(event).await {
            warn!(error = %err, "Failed to publish orchestration event");
        }
    }

    async fn publish_task(&self, task: &Task) {
        self.publish(OrchestrationEvent::TaskUpdated {
            task_id: task.id,
            status: task.status,
            progress: task.progress,
            total_cost: task.total_cost,
            current_agent_id: task.current_agent_id.clone(),
        })
        .await;
    }

    async fn publish_worker(&self, agent_id: &str) {
        if let Some(state) = self.monitor.get_state(agent_id).await {
            self.publish(OrchestrationEvent::AgentState(state.as_update()))
                .await;
        }
    }
}

/// Recompute progress from terminal subtask weights, and complete the task
/// when nothing is left open. Missing weights count as 1.
fn settle(task: &mut Task, weights: &HashMap<Uuid, u32>) {
    let weight = |s: &Subtask| f64::from(weights.get(&s.id).copied().unwrap_or(1));
    let total: f64 = task.subtasks.iter().map(weight).sum();
    let done: f64 = task
        .subtasks
        .iter()
        .filter(|s| s.status.is_terminal())
        .map(weight)
        .sum();

    if task.all_subtasks_terminal() && !task.status.is_terminal() {
        task.finish(TaskStatus::Completed);
    } else if total > 0.0 {
        task.progress = 100.0 * done / total;
    }
}
