//! HTTP and WebSocket front end for the SwarmVille orchestrator.

/// REST handlers.
pub mod api;
/// Registry of attached WebSocket clients.
pub mod connection;
/// Handler error type and status mapping.
pub mod error;
/// Inbound WebSocket frame routing.
pub mod router;
/// Router assembly and the WebSocket loop.
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{AppState, GatewayServer};
