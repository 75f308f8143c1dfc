//! Task orchestration for SwarmVille.
//!
//! Splits a high-level task into an ordered chain of subtasks, runs them one
//! at a time on the workers of a fixed roster, carries results forward
//! between workers, and keeps progress, cost and worker status up to date.
//!
//! # Main types
//!
//! - [`Orchestrator`] — Drives tasks and exposes pause / resume / reassign / approvals.
//! - [`decompose`] — Rule-table split of a description into [`SubtaskSpec`]s.
//! - [`InMemoryTaskStore`] — Process-local task store with revisioned replace.
//! - [`EventBus`] — Broadcast [`EventSink`](swarmville_core::EventSink) for observers.
//! - [`WorkerMonitor`] — Live worker status and metrics.

/// Approval requests raised by runs.
pub mod approvals;
/// Orchestrator configuration.
pub mod config;
/// Resource conflict detection.
pub mod conflict;
/// Rule-table decomposition.
pub mod decompose;
/// The orchestration loop and its external transitions.
pub mod engine;
/// Broadcast event bus.
pub mod events;
/// Handoff context builder.
pub mod handoff;
/// Worker status and metrics.
pub mod monitor;
/// Default worker roster.
pub mod profiles;
/// Error recovery policy.
pub mod recovery;
/// In-memory task store.
pub mod store;

pub use approvals::ApprovalBook;
pub use config::OrchestratorConfig;
pub use conflict::detect as detect_conflicts;
pub use decompose::{decompose, SubtaskSpec, TaskTemplate};
pub use engine::{Orchestrator, ReassignRequest, RunHandle, RunOutcome};
pub use events::EventBus;
pub use monitor::{WorkerMetrics, WorkerMonitor, WorkerState};
pub use profiles::default_roster;
pub use recovery::recover as recover_from_error;
pub use store::InMemoryTaskStore;
