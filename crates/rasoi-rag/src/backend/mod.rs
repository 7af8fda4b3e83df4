//! External collaborator contracts: classification, retrieval, completion.
//!
//! The orchestration core only ever talks to these traits; the HTTP gateway
//! implementation lives in [`http`], and tests substitute in-memory mocks.

use anyhow::Result;
use async_trait::async_trait;

use crate::intent::LabelSpec;
use crate::types::{FilterExpr, Record};

pub mod http;

pub use http::HttpBackend;

#[derive(Debug, Clone)]
pub struct LabelPrediction {
    pub label: String,
    pub confidence: Option<f32>,
}

/// Text-classification capability: one synchronous call with the full label
/// schema, returning at most one predicted label.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify_text(
        &self,
        text: &str,
        schema: &[LabelSpec],
    ) -> Result<Option<LabelPrediction>>;
}

/// Ranked retrieval over a named collection. Backends must tolerate an absent
/// filter; result order is the backend's relevance order.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        fields: &[&str],
        filter: Option<&FilterExpr>,
        limit: usize,
    ) -> Result<Vec<Record>>;
}

/// Generative completion, model-agnostic: the model id is an opaque string
/// passed through to the backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String>;
}
