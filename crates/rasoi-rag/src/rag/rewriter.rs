use regex::Regex;
use std::sync::{Arc, LazyLock};

use crate::backend::CompletionProvider;

static WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

const REWRITE_TEMPLATE: &str = "\
Based on the chat history below and the question, generate a query that extends the question \
with the chat history provided. The query should be in natural language. \
Answer with only the query. Do not add any explanation.\n\n\
<chat_history>\n{history}\n</chat_history>\n<question>\n{question}\n</question>";

/// Folds a bounded window of past turns plus the new question into one
/// self-contained natural-language query, via the completion backend.
///
/// Callers must only invoke this with a non-empty history window; rewriting
/// against empty history produces garbage from the backend, so the engine
/// short-circuits that case to the raw question.
pub struct HistoryRewriter {
    provider: Arc<dyn CompletionProvider>,
}

impl HistoryRewriter {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    pub async fn rewrite(&self, model: &str, history_text: &str, question: &str) -> String {
        let prompt = REWRITE_TEMPLATE
            .replace("{history}", history_text)
            .replace("{question}", question);

        match self.provider.complete(model, &prompt).await {
            Ok(raw) if !raw.trim().is_empty() => {
                let rewritten = sanitize_rewrite(&raw);
                tracing::debug!(original = %question, rewritten = %rewritten, "question rewritten with history");
                rewritten
            }
            Ok(_) => {
                tracing::warn!("rewrite returned empty response, keeping original question");
                question.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "rewrite backend fault, keeping original question");
                question.to_string()
            }
        }
    }
}

/// Strip single quotes (they would leak into structured filter and search
/// strings downstream) and collapse whitespace runs from model output.
fn sanitize_rewrite(raw: &str) -> String {
    let no_quotes = raw.replace('\'', "");
    WS_RE.replace_all(no_quotes.trim(), " ").to_string()
}
