//! End-to-end orchestration tests.
//!
//! Drives whole tasks through the orchestrator with scripted worker
//! backends. Checks: weighted progress, handoff between workers, pause and
//! resume at subtask boundaries, reassignment, approvals, and the
//! normalization of backend errors into failed subtasks.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use swarmville_agent::SimulatedBackend;
use swarmville_core::*;
use swarmville_orchestrator::*;
use tokio::sync::{broadcast, mpsc, Mutex, Semaphore};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Call {
    agent_id: String,
    description: String,
    context: Option<HandoffContext>,
}

#[derive(Default)]
struct ScriptedBackend {
    calls: Mutex<Vec<Call>>,
    /// When set, every call waits for a permit before returning.
    gate: Option<Arc<Semaphore>>,
    started: Option<mpsc::UnboundedSender<String>>,
    /// Descriptions containing one of these report `success = false`.
    fail_on: Vec<&'static str>,
    /// Descriptions containing one of these return `Err(Timeout)`.
    error_on: Vec<&'static str>,
    /// Descriptions containing one of these panic.
    panic_on: Vec<&'static str>,
}

impl ScriptedBackend {
    fn gated() -> (Self, Arc<Semaphore>, mpsc::UnboundedReceiver<String>) {
        let gate = Arc::new(Semaphore::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Self {
            gate: Some(Arc::clone(&gate)),
            started: Some(tx),
            ..Self::default()
        };
        (backend, gate, rx)
    }

    async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl WorkerBackend for ScriptedBackend {
    async fn execute(
        &self,
        worker: &WorkerDescriptor,
        description: &str,
        context: Option<&HandoffContext>,
    ) -> SwarmResult<WorkerResult> {
        self.calls.lock().await.push(Call {
            agent_id: worker.id.clone(),
            description: description.to_string(),
            context: context.cloned(),
        });
        if let Some(tx) = &self.started {
            let _ = tx.send(description.to_string());
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.panic_on.iter().any(|p| description.contains(p)) {
            panic!("backend blew up on {description}");
        }
        if self.error_on.iter().any(|p| description.contains(p)) {
            return Err(SwarmError::Timeout(format!("{description} took too long")));
        }
        if self.fail_on.iter().any(|p| description.contains(p)) {
            return Ok(WorkerResult::failure(ErrorDescriptor::new(
                ErrorKind::ToolFailure,
                "github unavailable",
            )));
        }
        Ok(
            WorkerResult::success(format!("{}: {description}", worker.id), format!("{} done", worker.id))
                .with_cost(0.01),
        )
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn roster() -> Vec<WorkerDescriptor> {
    vec![
        WorkerDescriptor::new("a", "Coder", "Senior Software Engineer").with_tools(["github"]),
        WorkerDescriptor::new("b", "Reviewer", "Quality Assurance Engineer")
            .with_tools(["github", "security_scanner"]),
        WorkerDescriptor::new("c", "Release", "DevOps Engineer").with_tools(["github", "slack"]),
    ]
}

fn quick() -> OrchestratorConfig {
    OrchestratorConfig::default().with_step_delay_ms(0)
}

struct Harness {
    orchestrator: Arc<Orchestrator>,
    store: Arc<InMemoryTaskStore>,
    bus: EventBus,
}

fn harness(
    backend: Arc<dyn WorkerBackend>,
    roster: Vec<WorkerDescriptor>,
    config: OrchestratorConfig,
) -> Harness {
    let store = Arc::new(InMemoryTaskStore::new());
    let bus = EventBus::new(1024);
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        backend,
        Arc::new(bus.clone()),
        roster,
        config,
    ));
    Harness {
        orchestrator,
        store,
        bus,
    }
}

fn drain(rx: &mut broadcast::Receiver<OrchestrationEvent>) -> Vec<OrchestrationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn shape(task: &Task) -> Vec<(String, String, SubtaskStatus, Option<String>)> {
    task.subtasks
        .iter()
        .map(|s| (s.agent_id.clone(), s.description.clone(), s.status, s.output.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// 1. "review pr #42" runs all three steps with weighted progress
// ---------------------------------------------------------------------------

#[tokio::test]
async fn review_pr_runs_to_completion_with_weighted_progress() {
    let backend = Arc::new(ScriptedBackend::default());
    let h = harness(backend.clone(), roster(), quick());
    let mut rx = h.bus.subscribe();

    let (task, handle) = h
        .orchestrator
        .submit("demo_user", "wf_review", "review pr #42")
        .await
        .unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Completed);

    let task = h.orchestrator.get(task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100.0);
    assert!(task.completed_at.is_some());
    assert!((task.total_cost - 0.03).abs() < 1e-9);

    let agents: Vec<&str> = task.subtasks.iter().map(|s| s.agent_id.as_str()).collect();
    assert_eq!(agents, vec!["a", "b", "c"]);
    assert!(task
        .subtasks
        .iter()
        .all(|s| s.status == SubtaskStatus::Completed));

    // Progress observed by subscribers never goes down and hits 100 only on completion
    let updates: Vec<(TaskStatus, f64)> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            OrchestrationEvent::TaskUpdated {
                task_id,
                status,
                progress,
                ..
            } if task_id == task.id => Some((status, progress)),
            _ => None,
        })
        .collect();
    assert!(updates.windows(2).all(|w| w[0].1 <= w[1].1));
    for (status, progress) in &updates {
        assert_eq!(*progress == 100.0, *status == TaskStatus::Completed);
    }
    let progresses: Vec<f64> = updates.iter().map(|(_, p)| *p).collect();
    assert!(progresses
        .iter()
        .any(|p| (p - 100.0 * 2.0 / 7.0).abs() < 1e-9));
    assert!(progresses
        .iter()
        .any(|p| (p - 100.0 * 5.0 / 7.0).abs() < 1e-9));
    assert_eq!(updates.last().unwrap().0, TaskStatus::Completed);
}

// ---------------------------------------------------------------------------
// 2. Handoff carries the previous result forward
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handoff_carries_previous_result() {
    let backend = Arc::new(ScriptedBackend::default());
    let h = harness(backend.clone(), roster(), quick());
    let (_, handle) = h
        .orchestrator
        .submit("u", "wf", "review pr #42")
        .await
        .unwrap();
    handle.await.unwrap().unwrap();

    let calls = backend.calls().await;
    assert_eq!(calls.len(), 3);
    assert!(calls[0].context.is_none());
    let second = calls[1].context.as_ref().unwrap();
    assert_eq!(
        second.previous_output.as_deref(),
        Some("a: Fetch and analyze PR code changes")
    );
    assert_eq!(second.previous_summary.as_deref(), Some("a done"));
    assert_eq!(second.flags.as_deref(), Some(&[][..]));
}

#[tokio::test]
async fn handoff_without_output_has_no_output_key() {
    let backend = Arc::new(ScriptedBackend::default());
    let config = quick().with_handoff(HandoffConfig {
        include_output: false,
        ..HandoffConfig::default()
    });
    let h = harness(backend.clone(), roster(), config);
    let (_, handle) = h
        .orchestrator
        .submit("u", "wf", "review pr #42")
        .await
        .unwrap();
    handle.await.unwrap().unwrap();

    for call in backend.calls().await.iter().skip(1) {
        let json = serde_json::to_value(call.context.as_ref().unwrap()).unwrap();
        assert!(json.get("previous_output").is_none());
        assert!(json.get("previous_summary").is_some());
    }
}

// ---------------------------------------------------------------------------
// 3. Empty roster: nothing to do, task completes at once
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_roster_completes_with_zero_subtasks() {
    let backend = Arc::new(ScriptedBackend::default());
    let h = harness(backend.clone(), Vec::new(), quick());
    let (task, handle) = h
        .orchestrator
        .submit("u", "wf", "review pr #42")
        .await
        .unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Completed);

    let task = h.orchestrator.get(task.id).await.unwrap();
    assert!(task.subtasks.is_empty());
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100.0);
    assert!(backend.calls().await.is_empty());
}

// ---------------------------------------------------------------------------
// 4. Pause between subtasks, then resume to the same final state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pause_and_resume_match_uninterrupted_run() {
    // Uninterrupted reference run
    let reference = Arc::new(ScriptedBackend::default());
    let h = harness(reference, roster(), quick());
    let (task, handle) = h.orchestrator.submit("u", "wf", "review pr #42").await.unwrap();
    handle.await.unwrap().unwrap();
    let expected = shape(&h.orchestrator.get(task.id).await.unwrap());

    // Interrupted run
    let (backend, gate, mut started) = ScriptedBackend::gated();
    let h = harness(Arc::new(backend), roster(), quick());
    let (task, handle) = h.orchestrator.submit("u", "wf", "review pr #42").await.unwrap();

    started.recv().await.unwrap();
    h.orchestrator.pause(task.id).await.unwrap();
    gate.add_permits(1);
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Paused);

    let paused = h.orchestrator.get(task.id).await.unwrap();
    assert_eq!(paused.status, TaskStatus::Paused);
    let statuses: Vec<SubtaskStatus> = paused.subtasks.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            SubtaskStatus::Completed,
            SubtaskStatus::Pending,
            SubtaskStatus::Pending
        ]
    );
    assert!((paused.progress - 100.0 * 2.0 / 7.0).abs() < 1e-9);

    // Running a paused task does nothing
    assert_eq!(h.orchestrator.run(task.id).await.unwrap(), RunOutcome::Paused);

    gate.add_permits(10);
    let (resumed, handle) = h.orchestrator.resume(task.id).await.unwrap();
    assert_eq!(resumed.status, TaskStatus::Running);
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Completed);

    let finished = h.orchestrator.get(task.id).await.unwrap();
    assert_eq!(shape(&finished), expected);
    assert_eq!(finished.progress, 100.0);
}

/// Store that pauses the task on the second read made while exactly one
/// subtask is terminal: the first is the loop-top check, the second is the
/// write that would start the next subtask.
struct PauseBeforeSecondStep {
    inner: InMemoryTaskStore,
    reads: AtomicUsize,
}

#[async_trait]
impl TaskStore for PauseBeforeSecondStep {
    async fn insert(&self, task: Task) -> SwarmResult<()> {
        self.inner.insert(task).await
    }

    async fn get(&self, id: Uuid) -> SwarmResult<Option<Task>> {
        let Some(task) = self.inner.get(id).await? else {
            return Ok(None);
        };
        let terminal = task.subtasks.iter().filter(|s| s.status.is_terminal()).count();
        if task.status == TaskStatus::Running
            && terminal == 1
            && self.reads.fetch_add(1, Ordering::SeqCst) == 1
        {
            let mut paused = task.clone();
            paused.status = TaskStatus::Paused;
            assert!(self.inner.compare_and_replace(paused, task.revision).await?);
            return self.inner.get(id).await;
        }
        Ok(Some(task))
    }

    async fn list(&self) -> SwarmResult<Vec<Task>> {
        self.inner.list().await
    }

    async fn compare_and_replace(&self, task: Task, expected_revision: u64) -> SwarmResult<bool> {
        self.inner.compare_and_replace(task, expected_revision).await
    }
}

#[tokio::test]
async fn pause_landing_after_boundary_check_stops_next_step() {
    let backend = Arc::new(ScriptedBackend::default());
    let store = Arc::new(PauseBeforeSecondStep {
        inner: InMemoryTaskStore::new(),
        reads: AtomicUsize::new(0),
    });
    let orchestrator = Arc::new(Orchestrator::new(
        store,
        backend.clone(),
        Arc::new(EventBus::new(64)),
        roster(),
        quick(),
    ));

    let (task, handle) = orchestrator.submit("u", "wf", "review pr #42").await.unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Paused);

    let paused = orchestrator.get(task.id).await.unwrap();
    assert_eq!(paused.status, TaskStatus::Paused);
    let statuses: Vec<SubtaskStatus> = paused.subtasks.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            SubtaskStatus::Completed,
            SubtaskStatus::Pending,
            SubtaskStatus::Pending
        ]
    );
    assert_eq!(backend.calls().await.len(), 1);
    assert!(paused.subtasks[1].started_at.is_none());

    let (_, handle) = orchestrator.resume(task.id).await.unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Completed);
    assert_eq!(backend.calls().await.len(), 3);
}

// ---------------------------------------------------------------------------
// 5. Guarded transitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pause_requires_running_and_fails_twice() {
    let (backend, gate, mut started) = ScriptedBackend::gated();
    let h = harness(Arc::new(backend), roster(), quick());

    // A pending task cannot be paused
    let pending = Task::new("u", "wf", "idle");
    let pending_id = pending.id;
    h.store.insert(pending).await.unwrap();
    let err = h.orchestrator.pause(pending_id).await.unwrap_err();
    assert!(err.is_invalid_transition());

    let (task, handle) = h.orchestrator.submit("u", "wf", "review pr #1").await.unwrap();
    started.recv().await.unwrap();
    h.orchestrator.pause(task.id).await.unwrap();
    let err = h.orchestrator.pause(task.id).await.unwrap_err();
    assert!(err.is_invalid_transition());

    // Resume only from paused
    let err = h.orchestrator.resume(pending_id).await.unwrap_err();
    assert!(err.is_invalid_transition());

    gate.add_permits(1);
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Paused);

    let missing = Uuid::new_v4();
    assert!(h.orchestrator.pause(missing).await.unwrap_err().is_not_found());
    assert!(h.orchestrator.resume(missing).await.unwrap_err().is_not_found());
    assert!(h
        .orchestrator
        .reassign(missing, "a")
        .await
        .unwrap_err()
        .is_not_found());
    assert_eq!(h.orchestrator.run(missing).await.unwrap(), RunOutcome::NotFound);
}

// ---------------------------------------------------------------------------
// 6. At most one run per task
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_run_is_a_no_op() {
    let (backend, gate, mut started) = ScriptedBackend::gated();
    let backend = Arc::new(backend);
    let h = harness(backend.clone(), roster(), quick());

    let (task, handle) = h.orchestrator.submit("u", "wf", "review pr #9").await.unwrap();
    started.recv().await.unwrap();
    assert_eq!(
        h.orchestrator.run(task.id).await.unwrap(),
        RunOutcome::AlreadyRunning
    );

    gate.add_permits(10);
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Completed);
    assert_eq!(backend.calls().await.len(), 3);

    // Completed tasks are not run again
    assert_eq!(h.orchestrator.run(task.id).await.unwrap(), RunOutcome::Completed);
    assert_eq!(backend.calls().await.len(), 3);
}

// ---------------------------------------------------------------------------
// 7. Reassignment
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reassign_rebinds_next_subtask_and_transfers_context() {
    let (backend, gate, mut started) = ScriptedBackend::gated();
    let backend = Arc::new(backend);
    let h = harness(backend.clone(), roster(), quick());

    // bug-fix template: investigate (a), implement (a), verify (b)
    let (task, handle) = h.orchestrator.submit("u", "wf", "fix bug in login").await.unwrap();
    started.recv().await.unwrap();

    let err = h.orchestrator.reassign(task.id, "ghost").await.unwrap_err();
    assert!(err.is_not_found());

    let reassigned = h.orchestrator.reassign(task.id, "c").await.unwrap();
    assert_eq!(reassigned.current_agent_id.as_deref(), Some("c"));
    // The running subtask keeps its worker, the next one moves
    assert_eq!(reassigned.subtasks[0].agent_id, "a");
    assert_eq!(reassigned.subtasks[1].agent_id, "c");

    gate.add_permits(10);
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Completed);

    let calls = backend.calls().await;
    let agents: Vec<&str> = calls.iter().map(|c| c.agent_id.as_str()).collect();
    assert_eq!(agents, vec!["a", "c", "b"]);
    assert_eq!(
        calls[1].context.as_ref().unwrap().previous_output.as_deref(),
        Some("a: Investigate and identify the bug")
    );

    let err = h.orchestrator.reassign(task.id, "b").await.unwrap_err();
    assert!(err.is_invalid_transition());
}

#[tokio::test]
async fn reassign_without_context_starts_fresh() {
    let (backend, gate, mut started) = ScriptedBackend::gated();
    let backend = Arc::new(backend);
    let h = harness(backend.clone(), roster(), quick());

    let (task, handle) = h.orchestrator.submit("u", "wf", "fix bug in login").await.unwrap();
    started.recv().await.unwrap();
    h.orchestrator
        .reassign_with(task.id, ReassignRequest::new("c").without_context())
        .await
        .unwrap();

    gate.add_permits(10);
    handle.await.unwrap().unwrap();

    let calls = backend.calls().await;
    assert_eq!(calls[1].agent_id, "c");
    assert!(calls[1].context.is_none());
    // The step after it gets a normal handoff again
    assert!(calls[2].context.is_some());
}

// ---------------------------------------------------------------------------
// 8. Backend errors become failed subtasks, never aborted runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backend_errors_are_normalized() {
    let backend = Arc::new(ScriptedBackend {
        error_on: vec!["Review code"],
        panic_on: vec!["Merge PR"],
        ..ScriptedBackend::default()
    });
    let h = harness(backend, roster(), quick());
    let mut rx = h.bus.subscribe();

    let (task, handle) = h.orchestrator.submit("u", "wf", "review pr #42").await.unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Completed);

    let task = h.orchestrator.get(task.id).await.unwrap();
    let statuses: Vec<SubtaskStatus> = task.subtasks.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            SubtaskStatus::Completed,
            SubtaskStatus::Failed,
            SubtaskStatus::Failed
        ]
    );
    assert_eq!(task.progress, 100.0);
    assert!(task.subtasks[1]
        .output
        .as_deref()
        .unwrap()
        .starts_with("Execution failed:"));

    let recoveries: Vec<RecoveryAction> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            OrchestrationEvent::RecoverySuggested { recovery, .. } => Some(recovery),
            _ => None,
        })
        .collect();
    assert_eq!(recoveries.len(), 2);
    assert!(matches!(
        recoveries[0],
        RecoveryAction::Retry { max_retries: 2, .. }
    ));
    assert!(matches!(recoveries[1], RecoveryAction::Escalate { .. }));
}

#[tokio::test]
async fn tool_failure_suggests_reassignment() {
    let backend = Arc::new(ScriptedBackend {
        fail_on: vec!["Fetch and analyze"],
        ..ScriptedBackend::default()
    });
    let h = harness(backend, roster(), quick());
    let mut rx = h.bus.subscribe();

    let (_, handle) = h.orchestrator.submit("u", "wf", "review pr #42").await.unwrap();
    handle.await.unwrap().unwrap();

    let suggestion = drain(&mut rx).into_iter().find_map(|e| match e {
        OrchestrationEvent::RecoverySuggested {
            agent_id, recovery, ..
        } => Some((agent_id, recovery)),
        _ => None,
    });
    let (agent_id, recovery) = suggestion.unwrap();
    assert_eq!(agent_id, "a");
    assert_eq!(
        recovery,
        RecoveryAction::Reassign {
            new_agent_id: "b".into(),
            message: "Reassigning to alternative agent".into()
        }
    );
}

// ---------------------------------------------------------------------------
// 9. Approvals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn approved_step_runs_after_decision() {
    let backend = Arc::new(ScriptedBackend::default());
    let h = harness(backend.clone(), roster(), quick().with_approvals(true));

    let (task, handle) = h.orchestrator.submit("u", "wf", "review pr #42").await.unwrap();
    let outcome = handle.await.unwrap().unwrap();
    let gated = h.orchestrator.get(task.id).await.unwrap();
    assert_eq!(
        outcome,
        RunOutcome::AwaitingApproval {
            subtask_id: gated.subtasks[2].id
        }
    );
    assert_eq!(gated.subtasks[2].status, SubtaskStatus::WaitingApproval);
    assert_eq!(gated.status, TaskStatus::Running);
    assert_eq!(backend.calls().await.len(), 2);

    let pending = h.orchestrator.approvals().pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].agent_id, "c");

    let state = h.orchestrator.monitor().get_state("c").await.unwrap();
    assert_eq!(state.status, WorkerActivity::WaitingApproval);

    let (approval, handle) = h
        .orchestrator
        .decide_approval(pending[0].id, true)
        .await
        .unwrap();
    assert_eq!(approval.status, ApprovalStatus::Approved);
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Completed);
    assert_eq!(backend.calls().await.len(), 3);

    let err = h
        .orchestrator
        .decide_approval(pending[0].id, false)
        .await
        .unwrap_err();
    assert!(err.is_invalid_transition());
}

#[tokio::test]
async fn early_approval_is_rejected_and_gate_still_holds() {
    let (backend, gate, mut started) = ScriptedBackend::gated();
    let h = harness(Arc::new(backend), roster(), quick().with_approvals(true));
    let (task, handle) = h.orchestrator.submit("u", "wf", "review pr #42").await.unwrap();

    started.recv().await.unwrap();
    let planned = h.orchestrator.get(task.id).await.unwrap();
    let merge = planned.subtasks[2].id;
    let err = h
        .orchestrator
        .resume_from_approval(task.id, merge, true)
        .await
        .unwrap_err();
    assert!(err.is_invalid_transition());

    gate.add_permits(10);
    assert_eq!(
        handle.await.unwrap().unwrap(),
        RunOutcome::AwaitingApproval { subtask_id: merge }
    );
    let pending = h.orchestrator.approvals().pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].subtask_id, merge);
    let gated = h.orchestrator.get(task.id).await.unwrap();
    assert_eq!(gated.subtasks[2].status, SubtaskStatus::WaitingApproval);
}

#[tokio::test]
async fn denied_step_fails_and_task_completes() {
    let backend = Arc::new(ScriptedBackend::default());
    let h = harness(backend.clone(), roster(), quick().with_approvals(true));

    let (task, handle) = h.orchestrator.submit("u", "wf", "review pr #42").await.unwrap();
    handle.await.unwrap().unwrap();
    let approval = h.orchestrator.approvals().pending().await.remove(0);

    let (_, handle) = h
        .orchestrator
        .decide_approval(approval.id, false)
        .await
        .unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Completed);

    let task = h.orchestrator.get(task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100.0);
    assert_eq!(task.subtasks[2].status, SubtaskStatus::Failed);
    assert_eq!(task.subtasks[2].output.as_deref(), Some("Approval denied"));
    assert_eq!(backend.calls().await.len(), 2);
}

// ---------------------------------------------------------------------------
// 10. Conflicts across tasks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn active_conflicts_span_tasks() {
    let h = harness(Arc::new(ScriptedBackend::default()), roster(), quick());
    for agent in ["c", "a"] {
        let mut task = Task::new("u", "wf", "deploy");
        let mut subtask = Subtask::new(task.id, agent, "Execute deployment")
            .with_resources(vec!["deployment".into()]);
        subtask.status = SubtaskStatus::Running;
        task.subtasks.push(subtask);
        task.status = TaskStatus::Running;
        h.store.insert(task).await.unwrap();
    }

    let conflicts = h.orchestrator.active_conflicts().await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].resource, "deployment");
    let mut agents = conflicts[0].agents.clone();
    agents.sort();
    assert_eq!(agents, vec!["a", "c"]);
}

// ---------------------------------------------------------------------------
// 11. The simulated backend end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn simulated_backend_with_default_roster() {
    let h = harness(
        Arc::new(SimulatedBackend::default()),
        default_roster(),
        quick(),
    );
    let (task, handle) = h
        .orchestrator
        .submit("demo_user", "wf_review", "Review PR #42 for the auth service")
        .await
        .unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), RunOutcome::Completed);

    let task = h.orchestrator.get(task.id).await.unwrap();
    assert_eq!(task.subtasks.len(), 3);
    assert!(task.total_cost > 0.0);
    assert!(task
        .subtasks
        .iter()
        .all(|s| s.output.as_deref().is_some_and(|o| !o.is_empty())));

    let states = h.orchestrator.monitor().snapshot().await;
    assert!(states.iter().all(|s| s.metrics.subtasks_run == 1));
    assert_eq!(h.orchestrator.list("demo_user").await.unwrap().len(), 1);
    assert!(h.orchestrator.list("nobody").await.unwrap().is_empty());
}
