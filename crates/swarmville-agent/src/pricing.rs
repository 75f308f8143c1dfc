//! Per-model price table used to annotate the roster.

/// Price per 1k tokens for a model / cost-tier tag. Unknown models cost 0.01.
pub fn cost_per_1k_tokens(model: &str) -> f64 {
    match model {
        "gpt-4" => 0.03,
        "gpt-4-turbo" => 0.01,
        "gpt-3.5-turbo" => 0.0005,
        "claude-3-opus" => 0.015,
        "claude-3-sonnet" => 0.003,
        "claude-3-haiku" => 0.00025,
        _ => 0.01,
    }
}
