//! Similarity search against the managed vector store.
//!
//! [`SupabaseRetriever`] invokes a Postgres function through the PostgREST
//! RPC endpoint `POST {url}/rest/v1/rpc/{function}`. The function receives
//! `query_embedding`, `match_threshold`, and `match_count`, and returns rows
//! with at least `content` and `similarity`, best match first.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::config::RetrievalConfig;
use crate::error::UpstreamError;
use crate::models::RetrievedChunk;
use crate::retry::{send_with_retry, RetryPolicy};

/// Arguments of one similarity search. Serializes as the RPC body.
#[derive(Debug, Clone, Serialize)]
pub struct MatchQuery<'a> {
    #[serde(rename = "query_embedding")]
    pub embedding: &'a [f32],
    pub match_threshold: f64,
    pub match_count: usize,
}

/// Returns the chunks most similar to an embedding.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Results are in backend rank order and may be empty.
    async fn retrieve(&self, query: &MatchQuery<'_>) -> Result<Vec<RetrievedChunk>, UpstreamError>;
}

/// Retriever backed by a Supabase (PostgREST) remote procedure.
pub struct SupabaseRetriever {
    client: reqwest::Client,
    key: String,
    url: String,
    retry: RetryPolicy,
}

impl SupabaseRetriever {
    /// Create a retriever for the project at `project_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or key is empty, or the HTTP client cannot be built.
    pub fn new(
        config: &RetrievalConfig,
        project_url: &str,
        key: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let key = key.into();
        if project_url.trim().is_empty() {
            anyhow::bail!("vector store URL must not be empty");
        }
        if key.trim().is_empty() {
            anyhow::bail!("vector store key must not be empty");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            key,
            url: rpc_url(project_url, &config.function),
            retry: config.retry_policy(),
        })
    }

    /// Create a retriever from `retrieval.url` (already overridden by
    /// `SUPABASE_URL` in [`crate::config::load_config`]) and `SUPABASE_KEY`.
    pub fn from_env(config: &RetrievalConfig) -> anyhow::Result<Self> {
        let url = config
            .url
            .clone()
            .or_else(|| std::env::var("SUPABASE_URL").ok())
            .ok_or_else(|| anyhow::anyhow!("SUPABASE_URL environment variable not set"))?;
        let key = std::env::var("SUPABASE_KEY")
            .map_err(|_| anyhow::anyhow!("SUPABASE_KEY environment variable not set"))?;
        Self::new(config, &url, key)
    }
}

fn rpc_url(project_url: &str, function: &str) -> String {
    format!("{}/rest/v1/rpc/{}", project_url.trim_end_matches('/'), function)
}

#[async_trait]
impl Retriever for SupabaseRetriever {
    async fn retrieve(&self, query: &MatchQuery<'_>) -> Result<Vec<RetrievedChunk>, UpstreamError> {
        let response = send_with_retry("vector search", &self.retry, || {
            self.client
                .post(&self.url)
                .header("apikey", &self.key)
                .bearer_auth(&self.key)
                .json(query)
        })
        .await?;

        let body = response.text().await?;
        serde_json::from_str::<Vec<RetrievedChunk>>(&body)
            .map_err(|e| UpstreamError::InvalidResponse(format!("expected array of matches: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_query_body_shape() {
        let embedding = [0.1f32, 0.2];
        let query = MatchQuery {
            embedding: &embedding,
            match_threshold: 0.78,
            match_count: 5,
        };
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["match_count"], 5);
        assert!((json["match_threshold"].as_f64().unwrap() - 0.78).abs() < 1e-9);
        assert_eq!(json["query_embedding"].as_array().unwrap().len(), 2);
        assert!(json.get("embedding").is_none());
    }

    #[test]
    fn test_rpc_url() {
        assert_eq!(
            rpc_url("https://abc.supabase.co/", "match_documents"),
            "https://abc.supabase.co/rest/v1/rpc/match_documents"
        );
    }

    #[test]
    fn test_rows_with_extra_columns_deserialize() {
        let body = r#"[
            {"id": 7, "content": "Refunds within 30 days.", "similarity": 0.91, "metadata": {}},
            {"id": 3, "content": "Contact support.", "similarity": 0.72}
        ]"#;
        let rows: Vec<RetrievedChunk> = serde_json::from_str(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content, "Refunds within 30 days.");
        assert!(rows[0].similarity > rows[1].similarity);
    }

    #[test]
    fn test_new_requires_url_and_key() {
        let config = RetrievalConfig::default();
        assert!(SupabaseRetriever::new(&config, "", "key").is_err());
        assert!(SupabaseRetriever::new(&config, "https://abc.supabase.co", "").is_err());
    }
}
