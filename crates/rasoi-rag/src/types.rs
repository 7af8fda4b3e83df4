use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single conversation turn. Immutable once appended to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// An opaque record returned by a retrieval backend: field name → scalar.
/// Identity is backend-defined; no cross-backend uniqueness is assumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub fields: HashMap<String, Value>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Render a field as text. Strings pass through, numbers are formatted,
    /// anything else (null, arrays, objects) counts as absent.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl From<HashMap<String, Value>> for Record {
    fn from(fields: HashMap<String, Value>) -> Self {
        Self { fields }
    }
}

/// Boolean predicate tree for faceted retrieval, serialized to the
/// backend's `{"@and": [{"@eq": {FIELD: value}}]}` wire shape.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Eq { field: String, value: String },
    And(Vec<FilterExpr>),
}

impl FilterExpr {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            FilterExpr::Eq { field, value } => {
                let mut term = Map::new();
                term.insert(field.clone(), Value::String(value.clone()));
                let mut outer = Map::new();
                outer.insert("@eq".to_string(), Value::Object(term));
                Value::Object(outer)
            }
            FilterExpr::And(terms) => {
                let mut outer = Map::new();
                outer.insert(
                    "@and".to_string(),
                    Value::Array(terms.iter().map(FilterExpr::to_value).collect()),
                );
                Value::Object(outer)
            }
        }
    }
}

impl Serialize for FilterExpr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Per-record payload in a [`ResultMap`], shaped by the turn's intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ResultPayload {
    /// Recipe intent: the instructions text for one dish.
    Instructions(String),
    /// Ingredient intents: the nutrition fields present on the record,
    /// in projection order. Absent fields are omitted, never defaulted.
    Nutrition(Vec<(String, Value)>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEntry {
    pub key: String,
    pub payload: ResultPayload,
}

/// Insertion-ordered key → payload mapping produced fresh each turn.
/// Order mirrors the backend's relevance order; consumed by the related-items
/// display and by export utilities as plain structured data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultMap {
    entries: Vec<ResultEntry>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, payload: ResultPayload) {
        self.entries.push(ResultEntry {
            key: key.into(),
            payload,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ResultPayload> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.payload)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_text_renders_strings_and_numbers() {
        let mut fields = HashMap::new();
        fields.insert("NAME".to_string(), json!("Orange"));
        fields.insert("CALORIES".to_string(), json!(47));
        fields.insert("TAGS".to_string(), json!(["citrus"]));
        let record = Record::from(fields);

        assert_eq!(record.text("NAME").as_deref(), Some("Orange"));
        assert_eq!(record.text("CALORIES").as_deref(), Some("47"));
        assert_eq!(record.text("TAGS"), None);
        assert_eq!(record.text("MISSING"), None);
    }

    #[test]
    fn filter_serializes_to_backend_wire_shape() {
        let filter = FilterExpr::And(vec![
            FilterExpr::eq("CUISINE", "Italian"),
            FilterExpr::eq("DIET", "Vegetarian"),
        ]);

        assert_eq!(
            filter.to_value(),
            json!({"@and": [
                {"@eq": {"CUISINE": "Italian"}},
                {"@eq": {"DIET": "Vegetarian"}},
            ]})
        );
    }

    #[test]
    fn result_map_preserves_insertion_order() {
        let mut map = ResultMap::new();
        map.push("Lasagna", ResultPayload::Instructions("Layer and bake.".into()));
        map.push("Sushi", ResultPayload::Instructions("Roll and slice.".into()));

        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["Lasagna", "Sushi"]);
        assert_eq!(
            map.get("Sushi"),
            Some(&ResultPayload::Instructions("Roll and slice.".into()))
        );
    }
}
