use std::sync::Arc;

use crate::backend::SearchService;
use crate::intent::{BindingTable, Intent};
use crate::types::{FilterExpr, Record};

/// Faceted constraints the caller may have selected. `None` means the facet
/// is inactive (the presentation layer's "ALL" choice).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetSelection {
    pub cuisine: Option<String>,
    pub diet: Option<String>,
}

impl FacetSelection {
    /// Build the `@and`-combined equality filter, or `None` when no facet is
    /// active. With `None` the backend is called without any filter at all.
    pub fn filter(&self) -> Option<FilterExpr> {
        let mut terms = Vec::new();
        if let Some(cuisine) = &self.cuisine {
            terms.push(FilterExpr::eq("CUISINE", cuisine));
        }
        if let Some(diet) = &self.diet {
            terms.push(FilterExpr::eq("DIET", diet));
        }
        if terms.is_empty() {
            None
        } else {
            Some(FilterExpr::And(terms))
        }
    }
}

/// Selects the backend collection and field projection for an intent and
/// executes the retrieval call. Does not re-rank; the backend's relevance
/// order is preserved.
pub struct RetrievalDispatcher {
    search: Arc<dyn SearchService>,
    bindings: BindingTable,
    top_k: usize,
}

impl RetrievalDispatcher {
    pub fn new(search: Arc<dyn SearchService>, bindings: BindingTable, top_k: usize) -> Self {
        Self {
            search,
            bindings,
            top_k,
        }
    }

    /// Fetch context records for a query under an intent. "No context" is a
    /// valid terminal state: unbound intents and backend faults both yield an
    /// empty list, distinguished only by their log signal.
    pub async fn retrieve(
        &self,
        query: &str,
        intent: Intent,
        facets: &FacetSelection,
    ) -> Vec<Record> {
        let Some(binding) = self.bindings.get(intent) else {
            tracing::warn!(label = intent.label(), "intent has no backend binding");
            return Vec::new();
        };

        let filter = facets.filter();
        match self
            .search
            .search(
                &binding.collection,
                query,
                binding.fields,
                filter.as_ref(),
                self.top_k,
            )
            .await
        {
            Ok(records) => {
                tracing::info!(
                    collection = %binding.collection,
                    label = intent.label(),
                    hits = records.len(),
                    "retrieval complete"
                );
                records
            }
            Err(e) => {
                tracing::warn!(
                    collection = %binding.collection,
                    error = %e,
                    "retrieval backend fault"
                );
                Vec::new()
            }
        }
    }
}
