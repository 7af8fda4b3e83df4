use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    render_history, sanitize_question, TurnReply, NO_CONTEXT_ANSWER, UNCLASSIFIED_ANSWER,
};
use crate::backend::{CompletionProvider, HttpBackend, SearchService, TextClassifier};
use crate::config::{ConfigError, RouterConfig};
use crate::intent::{BindingTable, Intent};
use crate::rag::{
    build_prompt, build_result_map, render_context, CompletionInvoker, FacetSelection,
    HistoryRewriter, IntentClassifier, RetrievalDispatcher,
};
use crate::session::ConversationState;
use crate::types::{Record, ResultMap, Turn};

const SHOPPING_LIST_TEMPLATE: &str = "\
You are a smart assistant. Create a comprehensive shopping list in Markdown format \
(use headers, bullet points, and **bold** where appropriate) based on the following ingredients:\n";

/// Orchestrates one conversation session through the turn state machine:
/// classify → (rewrite with history) → retrieve → assemble → complete.
///
/// Owns the session's [`ConversationState`] exclusively; a session is one
/// logical thread of control, so turns are processed strictly sequentially.
pub struct ChatEngine {
    config: RouterConfig,
    model: String,
    facets: FacetSelection,
    classifier: IntentClassifier,
    rewriter: HistoryRewriter,
    dispatcher: RetrievalDispatcher,
    invoker: CompletionInvoker,
    state: ConversationState,
}

impl ChatEngine {
    pub fn new(
        config: RouterConfig,
        classify: Arc<dyn TextClassifier>,
        search: Arc<dyn SearchService>,
        complete: Arc<dyn CompletionProvider>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let bindings = BindingTable::from_config(&config);
        let state = ConversationState::new(config.history.window, config.history.remember);
        let model = config.models.default.clone();

        Ok(Self {
            classifier: IntentClassifier::new(classify),
            rewriter: HistoryRewriter::new(complete.clone()),
            dispatcher: RetrievalDispatcher::new(search, bindings, config.retrieval.top_k),
            invoker: CompletionInvoker::new(complete),
            facets: FacetSelection::default(),
            model,
            config,
            state,
        })
    }

    /// Build an engine wired to the configured HTTP gateway for all three
    /// capabilities.
    pub fn from_config(config: RouterConfig) -> Result<Self> {
        let backend = Arc::new(HttpBackend::from_env(config.endpoint.as_str())?);
        Ok(Self::new(config, backend.clone(), backend.clone(), backend)?)
    }

    /// Process one user question and return the answer. Infallible by
    /// design: every stage fault is converted at its boundary into the
    /// stage's terminal value, and the turn is always appended.
    pub async fn handle_turn(&mut self, question: &str) -> TurnReply {
        let question = sanitize_question(question);
        self.state.append(Turn::user(&question));

        let Some(intent) = self.classifier.classify(&question).await else {
            return self.finish_turn(
                None,
                ResultMap::new(),
                Vec::new(),
                Vec::new(),
                UNCLASSIFIED_ANSWER.to_string(),
            );
        };

        // Window over past turns; the just-appended question is excluded.
        let window = self.state.recent_window(self.state.history_window);
        let remember = self.state.remember_history && !window.is_empty();
        let history_text = if remember {
            render_history(window)
        } else {
            String::new()
        };

        let search_query = if remember {
            self.rewriter
                .rewrite(&self.model, &history_text, &question)
                .await
        } else {
            question.clone()
        };

        let records = self
            .dispatcher
            .retrieve(&search_query, intent, &self.facets)
            .await;
        if records.is_empty() {
            return self.finish_turn(
                Some(intent),
                ResultMap::new(),
                Vec::new(),
                Vec::new(),
                NO_CONTEXT_ANSWER.to_string(),
            );
        }

        let result_map = build_result_map(&records, intent);
        let prompt = build_prompt(&question, &history_text, &render_context(&records));

        let ingredient_notes = if intent == Intent::IngredientByName {
            self.invoker
                .describe_ingredients(&self.model, &result_map)
                .await
        } else {
            Vec::new()
        };

        let answer = self.invoker.complete(&self.model, &prompt).await;
        self.finish_turn(Some(intent), result_map, records, ingredient_notes, answer)
    }

    fn finish_turn(
        &mut self,
        intent: Option<Intent>,
        result_map: ResultMap,
        records: Vec<Record>,
        ingredient_notes: Vec<(String, String)>,
        answer: String,
    ) -> TurnReply {
        self.state.append(Turn::assistant(&answer));
        self.state.current_intent = intent;
        self.state.last_result_map = if result_map.is_empty() {
            None
        } else {
            Some(result_map.clone())
        };
        self.state.last_records = records;
        self.state.last_answer = Some(answer.clone());

        TurnReply {
            answer,
            intent,
            result_map,
            ingredient_notes,
        }
    }

    /// Generate a Markdown shopping list from the ingredient lists of the
    /// stored recipe records. `None` when there is nothing to export or the
    /// completion backend fails; export affordances degrade to absence.
    pub async fn shopping_list(&self) -> Option<String> {
        if !self.export_ready() {
            return None;
        }

        let mut ingredients: Vec<String> = Vec::new();
        for record in &self.state.last_records {
            let Some(list) = record.text("TRANSLATEDINGREDIENTS") else {
                continue;
            };
            ingredients.extend(
                list.split(", ")
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty()),
            );
        }
        if ingredients.is_empty() {
            tracing::warn!("stored recipe records carry no ingredient data");
            return None;
        }

        let prompt = format!("{}{}", SHOPPING_LIST_TEMPLATE, ingredients.join("\n"));
        match self.invoker.try_complete(&self.model, &prompt).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                tracing::warn!("shopping list completion returned empty response");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "shopping list completion fault");
                None
            }
        }
    }

    /// "Start over": clears the session. Idempotent.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Select the generative model for subsequent turns. The id must come
    /// from the configured allow-list; it is otherwise opaque.
    pub fn set_model(&mut self, model: &str) -> Result<(), ConfigError> {
        if !self.config.models.allowed.iter().any(|m| m == model) {
            return Err(ConfigError::ModelNotAllowed(model.to_string()));
        }
        self.model = model.to_string();
        Ok(())
    }

    /// Select faceted constraints. The presentation layer's "ALL" choice (or
    /// an empty value) deactivates a facet.
    pub fn set_facets(&mut self, cuisine: &str, diet: &str) {
        self.facets = FacetSelection {
            cuisine: facet_value(cuisine),
            diet: facet_value(diet),
        };
    }

    pub fn set_remember_history(&mut self, remember: bool) {
        self.state.remember_history = remember;
    }

    pub fn session_id(&self) -> Uuid {
        self.state.session_id
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn last_answer(&self) -> Option<&str> {
        self.state.last_answer()
    }

    pub fn last_result_map(&self) -> Option<&ResultMap> {
        self.state.last_result_map()
    }

    pub fn last_records(&self) -> &[Record] {
        self.state.last_records()
    }

    /// Side annotation from the turn state machine: the last turn answered a
    /// recipe question with grounding data, so record export may be offered.
    pub fn export_ready(&self) -> bool {
        self.state.current_intent() == Some(Intent::Recipe)
            && self.state.last_result_map().is_some()
    }
}

fn facet_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LabelPrediction;
    use crate::intent::LabelSpec;
    use crate::rag::FALLBACK_ANSWER;
    use crate::types::FilterExpr;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockClassifier {
        label: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextClassifier for MockClassifier {
        async fn classify_text(
            &self,
            _text: &str,
            _schema: &[LabelSpec],
        ) -> Result<Option<LabelPrediction>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.label.clone().map(|label| LabelPrediction {
                label,
                confidence: None,
            }))
        }
    }

    struct MockSearch {
        records: Vec<Record>,
        calls: AtomicUsize,
        last_query: Mutex<String>,
        last_filter: Mutex<Option<Value>>,
    }

    #[async_trait]
    impl SearchService for MockSearch {
        async fn search(
            &self,
            _collection: &str,
            query: &str,
            _fields: &[&str],
            filter: Option<&FilterExpr>,
            _limit: usize,
        ) -> Result<Vec<Record>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_query.lock().unwrap() = query.to_string();
            *self.last_filter.lock().unwrap() = filter.map(FilterExpr::to_value);
            Ok(self.records.clone())
        }
    }

    struct MockCompleter {
        replies: Mutex<VecDeque<String>>,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionProvider for MockCompleter {
        async fn complete(&self, _model: &str, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("gateway unreachable"));
            }
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "Grounded answer.".to_string()))
        }
    }

    struct Harness {
        engine: ChatEngine,
        classifier: Arc<MockClassifier>,
        search: Arc<MockSearch>,
        completer: Arc<MockCompleter>,
    }

    fn harness(label: Option<&str>, records: Vec<Record>, replies: &[&str]) -> Harness {
        harness_with(label, records, replies, false)
    }

    fn harness_with(
        label: Option<&str>,
        records: Vec<Record>,
        replies: &[&str],
        completion_fails: bool,
    ) -> Harness {
        let classifier = Arc::new(MockClassifier {
            label: label.map(|s| s.to_string()),
            calls: AtomicUsize::new(0),
        });
        let search = Arc::new(MockSearch {
            records,
            calls: AtomicUsize::new(0),
            last_query: Mutex::new(String::new()),
            last_filter: Mutex::new(None),
        });
        let completer = Arc::new(MockCompleter {
            replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            fail: completion_fails,
            calls: AtomicUsize::new(0),
        });
        let engine = ChatEngine::new(
            RouterConfig::default(),
            classifier.clone(),
            search.clone(),
            completer.clone(),
        )
        .expect("default config is valid");

        Harness {
            engine,
            classifier,
            search,
            completer,
        }
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        let mut fields = HashMap::new();
        for (k, v) in pairs {
            fields.insert(k.to_string(), v.clone());
        }
        Record::from(fields)
    }

    fn lasagna_records() -> Vec<Record> {
        vec![
            record(&[
                ("TRANSLATEDRECIPENAME", json!("Classic Lasagna")),
                ("TRANSLATEDINSTRUCTIONS", json!("Layer pasta and bake.")),
                ("TRANSLATEDINGREDIENTS", json!("pasta, tomato, cheese")),
            ]),
            record(&[
                ("TRANSLATEDRECIPENAME", json!("Vegetable Lasagna")),
                ("TRANSLATEDINSTRUCTIONS", json!("Layer vegetables and bake.")),
                ("TRANSLATEDINGREDIENTS", json!("zucchini, tomato, cheese")),
            ]),
        ]
    }

    #[tokio::test]
    async fn recipe_turn_produces_answer_and_result_map() {
        let mut h = harness(Some("recipe"), lasagna_records(), &["Bake it well."]);
        h.engine.set_remember_history(false);

        let reply = h.engine.handle_turn("How do I make lasagna?").await;

        assert_eq!(reply.answer, "Bake it well.");
        assert_eq!(reply.intent, Some(Intent::Recipe));
        let keys: Vec<&str> = reply.result_map.keys().collect();
        assert_eq!(keys, vec!["Classic Lasagna", "Vegetable Lasagna"]);
        assert!(h.engine.export_ready());
        assert_eq!(h.engine.last_answer(), Some("Bake it well."));
        assert_eq!(h.engine.state().turns().len(), 2);
    }

    #[tokio::test]
    async fn unclassified_turn_short_circuits_before_retrieval() {
        let mut h = harness(None, lasagna_records(), &[]);

        let reply = h.engine.handle_turn("gibberish").await;

        assert_eq!(reply.answer, UNCLASSIFIED_ANSWER);
        assert_eq!(reply.intent, None);
        assert!(reply.result_map.is_empty());
        assert_eq!(h.search.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.completer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.engine.state().turns().len(), 2);
        assert!(!h.engine.export_ready());
    }

    #[tokio::test]
    async fn empty_retrieval_short_circuits_before_completion() {
        let mut h = harness(Some("recipe"), Vec::new(), &[]);
        h.engine.set_remember_history(false);

        let reply = h.engine.handle_turn("How do I make lasagna?").await;

        assert_eq!(reply.answer, NO_CONTEXT_ANSWER);
        assert_eq!(h.search.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.completer.calls.load(Ordering::SeqCst), 0);
        assert!(!h.engine.export_ready());
    }

    #[tokio::test]
    async fn disabled_history_skips_rewrite_and_keeps_question() {
        let mut h = harness(Some("recipe"), lasagna_records(), &[]);
        h.engine.set_remember_history(false);

        h.engine.handle_turn("How do I make lasagna?").await;
        h.engine.handle_turn("what about 'sushi'?").await;

        // One completion per turn (the answer), none for rewriting.
        assert_eq!(h.completer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*h.search.last_query.lock().unwrap(), "what about sushi?");
    }

    #[tokio::test]
    async fn history_rewrite_feeds_retrieval_on_later_turns() {
        let mut h = harness(
            Some("recipe"),
            lasagna_records(),
            &["First answer.", "lasagna baking time", "Second answer."],
        );

        // First turn: empty window, no rewrite.
        h.engine.handle_turn("How do I make lasagna?").await;
        assert_eq!(h.completer.calls.load(Ordering::SeqCst), 1);

        // Second turn: window present, rewrite runs before retrieval.
        let reply = h.engine.handle_turn("how long does it take?").await;
        assert_eq!(h.completer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(*h.search.last_query.lock().unwrap(), "lasagna baking time");
        assert_eq!(reply.answer, "Second answer.");
    }

    #[tokio::test]
    async fn named_ingredient_turn_fans_out_per_ingredient() {
        let records = vec![
            record(&[("NAME", json!("Orange")), ("CALORIES", json!(47))]),
            record(&[("NAME", json!("Paneer")), ("PROTEIN", json!("18g"))]),
        ];
        let mut h = harness(
            Some("ingredient-by-name"),
            records,
            &["Citrus note.", "Dairy note.", "Main answer."],
        );
        h.engine.set_remember_history(false);

        let reply = h.engine.handle_turn("nutrition facts of oranges?").await;

        assert_eq!(reply.answer, "Main answer.");
        assert_eq!(reply.ingredient_notes.len(), 2);
        assert_eq!(reply.ingredient_notes[0], ("Orange".to_string(), "Citrus note.".to_string()));
        assert_eq!(h.completer.calls.load(Ordering::SeqCst), 3);
        assert!(!h.engine.export_ready());
    }

    #[tokio::test]
    async fn malformed_record_is_skipped_in_result_map() {
        let records = vec![
            record(&[("NAME", json!("Orange")), ("CALORIES", json!(47))]),
            record(&[("CALORIES", json!(99))]),
        ];
        let mut h = harness(Some("ingredient-category"), records, &["Answer."]);
        h.engine.set_remember_history(false);

        let reply = h.engine.handle_turn("high vitamin C foods?").await;

        let keys: Vec<&str> = reply.result_map.keys().collect();
        assert_eq!(keys, vec!["Orange"]);
    }

    #[tokio::test]
    async fn completion_fault_degrades_to_fallback_answer() {
        let mut h = harness_with(Some("recipe"), lasagna_records(), &[], true);
        h.engine.set_remember_history(false);

        let reply = h.engine.handle_turn("How do I make lasagna?").await;

        assert_eq!(reply.answer, FALLBACK_ANSWER);
        assert_eq!(h.engine.state().turns().len(), 2);
    }

    #[tokio::test]
    async fn reset_clears_session_and_is_idempotent() {
        let mut h = harness(Some("recipe"), lasagna_records(), &[]);
        h.engine.set_remember_history(false);
        h.engine.handle_turn("How do I make lasagna?").await;
        assert!(h.engine.export_ready());

        h.engine.reset();
        let after_first = h.engine.state().clone();
        h.engine.reset();

        assert_eq!(h.engine.state(), &after_first);
        assert!(h.engine.state().turns().is_empty());
        assert!(!h.engine.export_ready());
        assert!(h.engine.last_answer().is_none());
    }

    #[tokio::test]
    async fn shopping_list_follows_a_recipe_turn() {
        let mut h = harness(
            Some("recipe"),
            lasagna_records(),
            &["Bake it.", "## Shopping List\n- pasta\n- tomato"],
        );
        h.engine.set_remember_history(false);

        assert_eq!(h.engine.shopping_list().await, None);

        h.engine.handle_turn("How do I make lasagna?").await;
        let list = h.engine.shopping_list().await;
        assert_eq!(list.as_deref(), Some("## Shopping List\n- pasta\n- tomato"));
    }

    #[tokio::test]
    async fn model_selection_is_bounded_by_allow_list() {
        let mut h = harness(Some("recipe"), Vec::new(), &[]);

        assert!(h.engine.set_model("mistral-7b").is_ok());
        assert!(matches!(
            h.engine.set_model("gpt-unknown"),
            Err(ConfigError::ModelNotAllowed(_))
        ));
    }

    #[tokio::test]
    async fn all_facet_choice_deactivates_the_filter_term() {
        let mut h = harness(Some("recipe"), lasagna_records(), &[]);
        h.engine.set_remember_history(false);
        h.engine.set_facets("ALL", "Vegetarian");

        h.engine.handle_turn("How do I make lasagna?").await;

        assert_eq!(
            h.search.last_filter.lock().unwrap().clone(),
            Some(json!({"@and": [{"@eq": {"DIET": "Vegetarian"}}]}))
        );
        assert_eq!(h.classifier.calls.load(Ordering::SeqCst), 1);
    }
}
