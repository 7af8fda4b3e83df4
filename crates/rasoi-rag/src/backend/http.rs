//! REST gateway client implementing all three service traits.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::{CompletionProvider, LabelPrediction, SearchService, TextClassifier};
use crate::intent::LabelSpec;
use crate::types::{FilterExpr, Record};

/// HTTP client for a gateway exposing `/classify`, `/search/{collection}`
/// and `/complete`. One instance serves all three capabilities.
pub struct HttpBackend {
    base_url: String,
    api_key: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .timeout(std::time::Duration::from_secs(120))
            .tcp_nodelay(true)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Build a backend reading the API key from `RASOI_API_KEY`. Credential
    /// management itself belongs to the embedding application.
    pub fn from_env(base_url: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("RASOI_API_KEY").unwrap_or_default();
        Self::new(base_url, api_key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let endpoint = self.url(path);
        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("request to {} timed out", endpoint)
                } else if e.is_connect() {
                    anyhow!("failed to connect to {}: {}", endpoint, e)
                } else {
                    anyhow!("request to {} failed: {}", endpoint, e)
                }
            })?;

        Self::parse_json_response(response, &endpoint).await
    }

    /// Parse a response body as JSON, with a clear error when the gateway
    /// returned an HTML error page instead.
    async fn parse_json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("failed to read response body from {}: {}", endpoint, e))?;
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "endpoint {} returned HTML instead of JSON (HTTP {}): {}",
                endpoint,
                status,
                preview
            ));
        }
        serde_json::from_str::<T>(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!(
                "failed to parse JSON from {} (HTTP {}): {}. Body: {}",
                endpoint,
                status,
                e,
                preview
            )
        })
    }
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
    labels: &'a [LabelSpec],
    task_description: &'a str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    label: Option<String>,
    confidence: Option<f32>,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    fields: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
    limit: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<HashMap<String, Value>>,
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct CompleteResponse {
    response: Option<String>,
}

#[async_trait]
impl TextClassifier for HttpBackend {
    async fn classify_text(
        &self,
        text: &str,
        schema: &[LabelSpec],
    ) -> Result<Option<LabelPrediction>> {
        let request = ClassifyRequest {
            text,
            labels: schema,
            task_description: "Classify the query by the intent of the user",
        };
        let response: ClassifyResponse = self.post_json("/classify", &request).await?;

        Ok(response
            .label
            .filter(|label| !label.trim().is_empty())
            .map(|label| LabelPrediction {
                label,
                confidence: response.confidence,
            }))
    }
}

#[async_trait]
impl SearchService for HttpBackend {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        fields: &[&str],
        filter: Option<&FilterExpr>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let request = SearchRequest {
            query,
            fields,
            filter: filter.map(FilterExpr::to_value),
            limit,
        };
        let path = format!("/search/{}", collection);
        let response: SearchResponse = self.post_json(&path, &request).await?;

        Ok(response.results.into_iter().map(Record::from).collect())
    }
}

#[async_trait]
impl CompletionProvider for HttpBackend {
    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        let request = CompleteRequest { model, prompt };
        let response: CompleteResponse = self.post_json("/complete", &request).await?;
        Ok(response.response.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_request_omits_absent_filter() {
        let request = SearchRequest {
            query: "lasagna",
            fields: &["TRANSLATEDRECIPENAME"],
            filter: None,
            limit: 3,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("filter").is_none());
        assert_eq!(value["limit"], 3);
    }

    #[test]
    fn search_request_carries_filter_tree() {
        let filter = FilterExpr::And(vec![FilterExpr::eq("CUISINE", "Italian")]);
        let request = SearchRequest {
            query: "lasagna",
            fields: &["TRANSLATEDRECIPENAME"],
            filter: Some(filter.to_value()),
            limit: 3,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["filter"],
            serde_json::json!({"@and": [{"@eq": {"CUISINE": "Italian"}}]})
        );
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let backend = HttpBackend::new("http://localhost:8088/", "key").unwrap();
        assert_eq!(backend.url("/complete"), "http://localhost:8088/complete");
    }
}
