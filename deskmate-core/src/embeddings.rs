//! Embeddings for knowledge records and queries.
//!
//! `EmbeddingBackend` is the seam retrieval code depends on. The shipped
//! implementation talks to an OpenAI-compatible `/embeddings` endpoint with
//! retry + jittered exponential backoff. Errors are returned to the caller;
//! degrading to keyword retrieval is the composer's job.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::EmbeddingConfig;

/// Environment variable holding the API key shared by embeddings and generation.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a document (record title + body).
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a search query. Defaults to `embed()`.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(text).await
    }

    fn dimensions(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Missing embedding in response")]
    MissingEmbedding,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed: {last}")]
    RetryExhausted { attempts: usize, last: String },
}

/// Settings for [`OpenAiEmbeddingClient`].
#[derive(Debug, Clone)]
pub struct EmbeddingClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimensions: usize,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl EmbeddingClientConfig {
    pub fn from_config(config: &EmbeddingConfig, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions as usize,
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub(crate) error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub(crate) message: String,
}

/// Pull the human-readable message out of an OpenAI-style error body.
pub(crate) fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| e.message)
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingClient {
    client: Client,
    config: EmbeddingClientConfig,
}

impl OpenAiEmbeddingClient {
    pub fn new(config: EmbeddingClientConfig) -> Result<Self, EmbeddingError> {
        if config.api_key.trim().is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self { client, config })
    }

    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries.saturating_sub(1));

        Retry::spawn(retry_strategy, || self.embed_once(text))
            .await
            .map_err(|e| {
                tracing::error!(
                    attempts = self.config.max_retries,
                    error = %e,
                    "All embedding attempts failed"
                );
                EmbeddingError::RetryExhausted {
                    attempts: self.config.max_retries,
                    last: e.to_string(),
                }
            })
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/embeddings", self.config.base_url);
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: text,
            dimensions: self.config.dimensions,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(&body);
            tracing::warn!(code = status.as_u16(), message = %message, "Embedding API error");
            return Err(EmbeddingError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        let values = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(EmbeddingError::MissingEmbedding)?;

        if values.len() != self.config.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.config.dimensions,
                actual: values.len(),
            });
        }

        Ok(values)
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_with_retry(text).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DIMS: usize = 8;

    fn test_config(api_key: &str, base_url: String) -> EmbeddingClientConfig {
        EmbeddingClientConfig {
            api_key: api_key.to_string(),
            base_url,
            model: "text-embedding-3-small".to_string(),
            dimensions: DIMS,
            max_retries: 3,
            retry_delay_ms: 10,
        }
    }

    fn mock_embedding_response(len: usize) -> serde_json::Value {
        let values: Vec<f32> = (0..len).map(|i| (i as f32 + 1.0) / len as f32).collect();
        serde_json::json!({ "data": [{ "embedding": values, "index": 0 }] })
    }

    #[tokio::test]
    async fn test_embed_posts_model_input_and_dimensions() {
        let mock_server = MockServer::start().await;
        let client = OpenAiEmbeddingClient::new(test_config("sk-test", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(serde_json::json!({
                "model": "text-embedding-3-small",
                "input": "opening hours",
                "dimensions": DIMS
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response(DIMS)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let embedding = client.embed("opening hours").await.unwrap();
        assert_eq!(embedding.len(), DIMS);
        assert_eq!(client.name(), "openai");
        assert_eq!(client.dimensions(), DIMS);
    }

    #[tokio::test]
    async fn test_embed_retries_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client = OpenAiEmbeddingClient::new(test_config("sk-test", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "message": "Rate limit reached", "type": "requests" }
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response(DIMS)))
            .mount(&mock_server)
            .await;

        assert!(client.embed_query("hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_embed_exhausts_retries_on_500() {
        let mock_server = MockServer::start().await;
        let client = OpenAiEmbeddingClient::new(test_config("sk-test", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "message": "upstream exploded" }
            })))
            .expect(3)
            .mount(&mock_server)
            .await;

        match client.embed("hello").await {
            Err(EmbeddingError::RetryExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(last.contains("upstream exploded"), "{}", last);
            }
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_dimensions_is_an_error() {
        let mock_server = MockServer::start().await;
        let client = OpenAiEmbeddingClient::new(test_config("sk-test", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response(3)))
            .mount(&mock_server)
            .await;

        let err = client.embed("hello").await.unwrap_err();
        assert!(err.to_string().contains("expected 8 dimensions, got 3"), "{}", err);
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let result = OpenAiEmbeddingClient::new(test_config("  ", "http://localhost".into()));
        assert!(matches!(result, Err(EmbeddingError::MissingApiKey)));
    }

    #[test]
    fn test_api_error_message_falls_back_to_body() {
        assert_eq!(api_error_message(r#"{"error":{"message":"bad key"}}"#), "bad key");
        assert_eq!(api_error_message("gateway timeout"), "gateway timeout");
    }
}
