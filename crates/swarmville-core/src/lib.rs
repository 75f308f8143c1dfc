//! Core types and error definitions for SwarmVille.
//!
//! This crate provides the foundational types shared across all SwarmVille
//! crates: the task/subtask domain model, worker descriptors and results,
//! orchestration events, approval records, and the collaborator traits the
//! orchestration engine is written against.
//!
//! # Main types
//!
//! - [`SwarmError`] — Unified error enum for all SwarmVille subsystems.
//! - [`SwarmResult`] — Convenience alias for `Result<T, SwarmError>`.
//! - [`Task`] / [`Subtask`] — The unit of work and its ordered steps.
//! - [`WorkerDescriptor`] — A roster entry (role, tools, model tier).
//! - [`WorkerResult`] / [`HandoffContext`] — What flows between workers.
//! - [`TaskStore`], [`WorkerBackend`], [`EventSink`] — Collaborator seams.

/// Approval types for human-in-the-loop subtasks.
pub mod approval;
/// Error taxonomy.
pub mod error;
/// Orchestration events and the event sink trait.
pub mod event;
/// Error descriptors and recovery actions.
pub mod recovery;
/// Task store trait.
pub mod store;
/// Task, subtask and conflict records.
pub mod task;
/// Worker descriptors, results, handoff types and the backend trait.
pub mod worker;

pub use approval::{ApprovalRequest, ApprovalStatus};
pub use error::{SwarmError, SwarmResult};
pub use event::{AgentStateUpdate, EventSink, OrchestrationEvent, WorkerActivity};
pub use recovery::{ErrorDescriptor, ErrorKind, RecoveryAction};
pub use store::TaskStore;
pub use task::{Conflict, ConflictKind, Subtask, SubtaskStatus, Task, TaskStatus};
pub use worker::{
    FlagKind, HandoffConfig, HandoffContext, ResultFlag, WorkerBackend, WorkerDescriptor,
    WorkerResult,
};
