use swarmville_core::{ErrorDescriptor, ErrorKind, RecoveryAction, Subtask, WorkerDescriptor};

/// Decide what should happen after `failed` went wrong with `error`.
///
/// Advisory only: the caller decides whether to act on the returned action.
pub fn recover(
    error: &ErrorDescriptor,
    failed: &Subtask,
    roster: &[WorkerDescriptor],
) -> RecoveryAction {
    match error.kind {
        ErrorKind::ToolFailure => {
            let alternative = roster
                .iter()
                .filter(|w| w.id != failed.agent_id)
                .find(|w| w.has_tools(&failed.required_tools));
            match alternative {
                Some(worker) => RecoveryAction::Reassign {
                    new_agent_id: worker.id.clone(),
                    message: "Reassigning to alternative agent".to_string(),
                },
                None => escalate(error),
            }
        }
        ErrorKind::Timeout => RecoveryAction::Retry {
            max_retries: 2,
            message: "Retrying with increased timeout".to_string(),
        },
        ErrorKind::Unknown => escalate(error),
    }
}

fn escalate(error: &ErrorDescriptor) -> RecoveryAction {
    RecoveryAction::Escalate {
        message: format!("Unable to recover from error: {}", error.message_or_default()),
    }
}
