//! Error descriptors and the recovery actions the policy can recommend.

use crate::SwarmError;
use serde::{Deserialize, Serialize};

/// Category of a subtask failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ToolFailure,
    Timeout,
    #[serde(other)]
    Unknown,
}

/// Describes why a subtask failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorDescriptor {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or("Unknown error")
    }
}

impl From<&SwarmError> for ErrorDescriptor {
    fn from(err: &SwarmError) -> Self {
        let kind = match err {
            SwarmError::Timeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::Unknown,
        };
        Self::new(kind, err.to_string())
    }
}

/// What should happen after a subtask failure. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecoveryAction {
    Reassign { new_agent_id: String, message: String },
    Retry { max_retries: u32, message: String },
    Escalate { message: String },
}
