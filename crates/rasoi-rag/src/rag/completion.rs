use anyhow::Result;
use std::sync::Arc;

use crate::backend::CompletionProvider;
use crate::types::ResultMap;

/// Answer returned when the completion backend gives nothing usable, so the
/// hot path never carries a null or an error.
pub const FALLBACK_ANSWER: &str = "No response received.";

/// Sends assembled prompts to the completion backend. Model-agnostic: the
/// model id is passed through opaque; the allow-list is enforced where the
/// caller selects a model, not here.
pub struct CompletionInvoker {
    provider: Arc<dyn CompletionProvider>,
}

impl CompletionInvoker {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Complete a grounded prompt, degrading to [`FALLBACK_ANSWER`] on any
    /// backend fault or empty response.
    pub async fn complete(&self, model: &str, prompt: &str) -> String {
        match self.try_complete(model, prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!(model, "completion backend returned empty response");
                FALLBACK_ANSWER.to_string()
            }
            Err(e) => {
                tracing::warn!(model, error = %e, "completion backend fault");
                FALLBACK_ANSWER.to_string()
            }
        }
    }

    /// Raw completion for callers that need to distinguish a fault from an
    /// answer (export affordances degrade to absence, not to fallback text).
    pub async fn try_complete(&self, model: &str, prompt: &str) -> Result<String> {
        self.provider.complete(model, prompt).await
    }

    /// Secondary mode for the named-ingredient intent: one minimal completion
    /// per ingredient in the result map, issued sequentially before the main
    /// grounded call. Individual faults are logged and skipped; an empty
    /// fan-out set is a no-op. The notes are side context only and are not
    /// required to reach the user.
    pub async fn describe_ingredients(
        &self,
        model: &str,
        map: &ResultMap,
    ) -> Vec<(String, String)> {
        let mut notes = Vec::new();
        for entry in map.iter() {
            let prompt = format!(
                "In one sentence, describe the ingredient \"{}\" and its main nutritional value.",
                entry.key
            );
            match self.try_complete(model, &prompt).await {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::debug!(ingredient = %entry.key, "fan-out note generated");
                    notes.push((entry.key.clone(), text.trim().to_string()));
                }
                Ok(_) => {
                    tracing::debug!(ingredient = %entry.key, "fan-out returned empty response");
                }
                Err(e) => {
                    tracing::warn!(ingredient = %entry.key, error = %e, "fan-out completion fault");
                }
            }
        }
        notes
    }
}
