//! Text embedding.
//!
//! Defines the [`Embedder`] trait and [`OpenAIEmbedder`], which calls the
//! OpenAI-compatible `POST {base_url}/embeddings` endpoint with retry and
//! backoff (see [`crate::retry`]).

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::UpstreamError;
use crate::retry::{send_with_retry, RetryPolicy};

/// Converts a piece of text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed a single text. The vector's length is fixed by the model.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError>;
}

/// Embedder backed by the OpenAI embeddings API.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
    retry: RetryPolicy,
}

impl OpenAIEmbedder {
    /// Create an embedder with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the HTTP client cannot be built.
    pub fn new(config: &EmbeddingConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            anyhow::bail!("OpenAI API key must not be empty");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            url: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            retry: config.retry_policy(),
        })
    }

    /// Create an embedder using the `OPENAI_API_KEY` environment variable.
    pub fn from_env(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::new(config, api_key)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = send_with_retry("embeddings", &self.retry, || {
            self.client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        let json: Value = response.json().await?;
        parse_embedding_response(&json)
    }
}

/// Extract `data[0].embedding` from an embeddings API response.
fn parse_embedding_response(json: &Value) -> Result<Vec<f32>, UpstreamError> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| UpstreamError::InvalidResponse("missing data[0].embedding".into()))?;

    let vector = embedding
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| UpstreamError::InvalidResponse("non-numeric embedding value".into()))
        })
        .collect::<Result<Vec<f32>, _>>()?;

    if vector.is_empty() {
        return Err(UpstreamError::InvalidResponse("empty embedding".into()));
    }

    Ok(vector)
}
