use uuid::Uuid;

use crate::intent::Intent;
use crate::types::{Record, ResultMap, Turn};

/// Per-session conversation state. Owned exclusively by the turn engine;
/// no other component mutates it. One instance per active session.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    pub session_id: Uuid,
    pub(crate) turns: Vec<Turn>,
    pub(crate) history_window: usize,
    pub(crate) remember_history: bool,
    pub(crate) current_intent: Option<Intent>,
    pub(crate) last_result_map: Option<ResultMap>,
    pub(crate) last_records: Vec<Record>,
    pub(crate) last_answer: Option<String>,
}

impl ConversationState {
    pub fn new(history_window: usize, remember_history: bool) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            turns: Vec::new(),
            history_window,
            remember_history,
            current_intent: None,
            last_result_map: None,
            last_records: Vec::new(),
            last_answer: None,
        }
    }

    /// Append a turn. Raw storage is uncapped; windowing happens at read time.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Clear turns and derived per-turn fields. Idempotent; the session id
    /// survives a reset.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.current_intent = None;
        self.last_result_map = None;
        self.last_records.clear();
        self.last_answer = None;
    }

    /// The last `n` turns, excluding the most recent one (the just-asked,
    /// not-yet-answered question), in chronological order. Short histories
    /// return whatever is available.
    pub fn recent_window(&self, n: usize) -> &[Turn] {
        if self.turns.is_empty() {
            return &[];
        }
        let upto = self.turns.len() - 1;
        let start = upto.saturating_sub(n);
        &self.turns[start..upto]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn current_intent(&self) -> Option<Intent> {
        self.current_intent
    }

    pub fn last_result_map(&self) -> Option<&ResultMap> {
        self.last_result_map.as_ref()
    }

    pub fn last_records(&self) -> &[Record] {
        &self.last_records
    }

    pub fn last_answer(&self) -> Option<&str> {
        self.last_answer.as_deref()
    }
}
