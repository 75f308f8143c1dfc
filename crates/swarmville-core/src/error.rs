use thiserror::Error;

/// A convenience `Result` alias using [`SwarmError`].
pub type SwarmResult<T> = Result<T, SwarmError>;

/// Top-level error type for SwarmVille.
///
/// The first four variants form the orchestration taxonomy; the rest are
/// raised by collaborators (store, backend, channels, config).
#[derive(Error, Debug)]
pub enum SwarmError {
    /// An unknown task, worker, subtask or approval id.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up ("task", "worker", ...).
        kind: &'static str,
        /// The id that did not resolve.
        id: String,
    },

    /// An operation whose precondition on the current status is unmet.
    #[error("Cannot {operation} {id} while it is {from}")]
    InvalidStateTransition {
        /// Id of the task or approval the operation targeted.
        id: String,
        /// Status observed when the operation was attempted.
        from: String,
        /// The rejected operation.
        operation: &'static str,
    },

    /// A worker backend call failed or reported `success = false`.
    #[error("Subtask execution failed: {0}")]
    SubtaskExecution(String),

    /// An unexpected fault in the orchestration loop's own bookkeeping.
    #[error("Orchestration fault: {0}")]
    OrchestrationFault(String),

    /// An error raised inside a worker backend.
    #[error("Worker error: {0}")]
    Worker(String),

    /// A worker backend reported that it ran out of time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// An error from the task store.
    #[error("Store error: {0}")]
    Store(String),

    /// An error from a notification channel.
    #[error("Channel error: {0}")]
    Channel(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SwarmError {
    /// Unknown task id.
    pub fn task_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "task",
            id: id.to_string(),
        }
    }

    /// Unknown worker id.
    pub fn worker_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "worker",
            id: id.to_string(),
        }
    }

    /// Unknown approval id.
    pub fn approval_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "approval",
            id: id.to_string(),
        }
    }

    /// Unknown subtask id.
    pub fn subtask_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            kind: "subtask",
            id: id.to_string(),
        }
    }

    /// Precondition failure for `operation` on `id` observed in state `from`.
    pub fn invalid_transition(
        id: impl ToString,
        from: impl ToString,
        operation: &'static str,
    ) -> Self {
        Self::InvalidStateTransition {
            id: id.to_string(),
            from: from.to_string(),
            operation,
        }
    }

    /// Whether this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is an `InvalidStateTransition` error.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidStateTransition { .. })
    }
}
