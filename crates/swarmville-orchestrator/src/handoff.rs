use swarmville_core::{HandoffConfig, HandoffContext, WorkerResult};

/// Build the context handed to the next worker from the previous result.
///
/// Each field is copied only when its flag in `config` is set; excluded
/// fields stay `None` and are omitted when serialized.
pub fn build(previous: &WorkerResult, config: &HandoffConfig) -> HandoffContext {
    HandoffContext {
        previous_output: if config.include_output {
            previous.output.clone()
        } else {
            None
        },
        previous_summary: if config.include_summary {
            previous.summary.clone()
        } else {
            None
        },
        flags: config.include_flags.then(|| previous.flags.clone()),
        original_context: if config.include_context {
            previous.context.clone()
        } else {
            None
        },
    }
}
