use std::sync::Arc;

use crate::backend::TextClassifier;
use crate::intent::{label_schema, Intent, LabelSpec};

/// Maps a raw question to one of the configured intents via the external
/// classification service. Failure of any kind degrades to "unclassified";
/// a turn is never crashed by this stage.
pub struct IntentClassifier {
    provider: Arc<dyn TextClassifier>,
    schema: Vec<LabelSpec>,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn TextClassifier>) -> Self {
        Self {
            provider,
            schema: label_schema(),
        }
    }

    pub async fn classify(&self, query: &str) -> Option<Intent> {
        match self.provider.classify_text(query, &self.schema).await {
            Ok(Some(prediction)) => match Intent::from_label(prediction.label.trim()) {
                Some(intent) => {
                    tracing::info!(
                        label = intent.label(),
                        confidence = ?prediction.confidence,
                        "query classified"
                    );
                    Some(intent)
                }
                None => {
                    tracing::warn!(
                        label = %prediction.label,
                        "classifier returned a label outside the schema"
                    );
                    None
                }
            },
            Ok(None) => {
                tracing::warn!("classifier returned no label");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "classification service fault");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LabelPrediction;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    struct FixedClassifier {
        reply: Option<String>,
        fail: bool,
    }

    #[async_trait]
    impl TextClassifier for FixedClassifier {
        async fn classify_text(
            &self,
            _text: &str,
            _schema: &[LabelSpec],
        ) -> Result<Option<LabelPrediction>> {
            if self.fail {
                return Err(anyhow!("connection refused"));
            }
            Ok(self.reply.clone().map(|label| LabelPrediction {
                label,
                confidence: Some(0.9),
            }))
        }
    }

    fn classifier(reply: Option<&str>, fail: bool) -> IntentClassifier {
        IntentClassifier::new(Arc::new(FixedClassifier {
            reply: reply.map(|s| s.to_string()),
            fail,
        }))
    }

    #[tokio::test]
    async fn known_label_maps_to_intent() {
        let got = classifier(Some("recipe"), false).classify("how to bake").await;
        assert_eq!(got, Some(Intent::Recipe));
    }

    #[tokio::test]
    async fn unknown_label_degrades_to_none() {
        let got = classifier(Some("smalltalk"), false).classify("hello").await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn missing_label_degrades_to_none() {
        let got = classifier(None, false).classify("???").await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn service_fault_degrades_to_none() {
        let got = classifier(Some("recipe"), true).classify("how to bake").await;
        assert_eq!(got, None);
    }
}
