//! Worker execution for SwarmVille.
//!
//! Provides [`SimulatedBackend`], a [`swarmville_core::WorkerBackend`] that
//! runs a catalog of mock tools (GitHub, Slack, Jira, a linter and a
//! security scanner) instead of calling a model, plus the per-model
//! pricing table used for display.

/// Backend tuning knobs.
pub mod config;
/// Simulated worker backend.
pub mod executor;
/// Cost table per model tier.
pub mod pricing;
/// Mock tool catalog and tool selection.
pub mod tools;

pub use config::BackendConfig;
pub use executor::SimulatedBackend;
pub use pricing::cost_per_1k_tokens;
