//! Conversational query router for recipe and nutrition questions.
//!
//! Turns a free-text utterance into a grounded answer: intent classification,
//! history-aware query rewriting, retrieval from the intent's backend
//! collection, grounded prompt assembly, and generative completion. The
//! presentation layer, export renderers, and the search/classification/
//! completion services themselves are external collaborators reached through
//! the traits in [`backend`].

pub mod backend;
pub mod chat;
pub mod config;
pub mod intent;
pub mod rag;
pub mod session;
pub mod types;

pub use chat::{ChatEngine, TurnReply, NO_CONTEXT_ANSWER, UNCLASSIFIED_ANSWER};
pub use config::{ConfigError, RouterConfig};
pub use intent::{Intent, LabelSpec};
pub use rag::{FacetSelection, FALLBACK_ANSWER};
pub use session::ConversationState;
pub use types::{FilterExpr, Record, ResultMap, ResultPayload, Role, Turn};

pub use anyhow::{Error, Result};
