use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::intent::Intent;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("models.allowed must not be empty")]
    EmptyModelList,
    #[error("model '{0}' is not in the allow-list")]
    ModelNotAllowed(String),
    #[error("retrieval.top_k must be > 0")]
    ZeroTopK,
    #[error("intent '{0}' has no collection bound")]
    UnboundIntent(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Base URL of the gateway exposing classify/search/complete.
    pub endpoint: String,
    pub models: ModelConfig,
    pub retrieval: RetrievalConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Opaque model identifiers the completion backend accepts.
    pub allowed: Vec<String>,
    pub default: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Records per retrieval call. Accuracy/latency knob.
    pub top_k: usize,
    pub recipes_collection: String,
    pub nutrition_collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Sliding window of past turns considered when rewriting a question.
    pub window: usize,
    pub remember: bool,
}

impl RouterConfig {
    /// Validate config values, returning errors for clearly broken
    /// configurations. An intent without a collection is a configuration
    /// error, not something to discover mid-turn.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.allowed.is_empty() {
            return Err(ConfigError::EmptyModelList);
        }
        if !self.models.allowed.contains(&self.models.default) {
            return Err(ConfigError::ModelNotAllowed(self.models.default.clone()));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ZeroTopK);
        }
        if self.retrieval.recipes_collection.trim().is_empty() {
            return Err(ConfigError::UnboundIntent(Intent::Recipe.label()));
        }
        if self.retrieval.nutrition_collection.trim().is_empty() {
            return Err(ConfigError::UnboundIntent(Intent::IngredientCategory.label()));
        }
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the platform config directory when a file exists there,
    /// otherwise fall back to defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rasoi-rag")
            .join("config.json")
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8088".to_string(),
            models: ModelConfig {
                allowed: vec![
                    "mixtral-8x7b".to_string(),
                    "mistral-large".to_string(),
                    "mistral-7b".to_string(),
                ],
                default: "mixtral-8x7b".to_string(),
            },
            retrieval: RetrievalConfig {
                top_k: 3,
                recipes_collection: "FOOD_SEARCH".to_string(),
                nutrition_collection: "NUTRITION_SEARCH".to_string(),
            },
            history: HistoryConfig {
                window: 7,
                remember: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RouterConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_model_list() {
        let mut config = RouterConfig::default();
        config.models.allowed.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyModelList)
        ));
    }

    #[test]
    fn rejects_default_model_outside_allow_list() {
        let mut config = RouterConfig::default();
        config.models.default = "gpt-unknown".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ModelNotAllowed(_))
        ));
    }

    #[test]
    fn rejects_unbound_collection() {
        let mut config = RouterConfig::default();
        config.retrieval.nutrition_collection = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnboundIntent(_))
        ));
    }

    #[test]
    fn rejects_zero_top_k() {
        let mut config = RouterConfig::default();
        config.retrieval.top_k = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTopK)));
    }
}
