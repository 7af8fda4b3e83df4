//! Pipeline stages: classification, history rewrite, retrieval dispatch,
//! prompt assembly, completion invocation.

pub mod classifier;
pub mod completion;
pub mod prompt;
pub mod retrieval;
pub mod rewriter;

pub use classifier::IntentClassifier;
pub use completion::{CompletionInvoker, FALLBACK_ANSWER};
pub use prompt::{build_prompt, build_result_map, render_context};
pub use retrieval::{FacetSelection, RetrievalDispatcher};
pub use rewriter::HistoryRewriter;
