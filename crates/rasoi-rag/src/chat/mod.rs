//! Turn-level types and helpers shared by the engine.

pub mod engine;

pub use engine::ChatEngine;

use crate::intent::Intent;
use crate::types::{ResultMap, Turn};

/// Terminal answer when classification produced no usable label.
pub const UNCLASSIFIED_ANSWER: &str = "Unable to classify the query.";

/// Terminal answer when retrieval produced no context records.
pub const NO_CONTEXT_ANSWER: &str = "No relevant context found.";

/// Outcome of one processed turn.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub answer: String,
    pub intent: Option<Intent>,
    pub result_map: ResultMap,
    /// Per-ingredient fan-out answers (named-ingredient intent only).
    /// Side context; never required for the main answer.
    pub ingredient_notes: Vec<(String, String)>,
}

/// Render a history window as plain role-prefixed lines for prompt sections.
pub fn render_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strip single quotes from raw user input before it enters the pipeline;
/// they would otherwise leak into filter and search strings.
pub fn sanitize_question(question: &str) -> String {
    question.replace('\'', "").trim().to_string()
}
