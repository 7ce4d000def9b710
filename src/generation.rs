//! Answer generation through a chat-completion API.
//!
//! The system prompt is the configured instructions followed by the
//! assembled context; the user's message is sent as-is. Only the first
//! choice of the completion is used.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::UpstreamError;
use crate::retry::{send_with_retry, RetryPolicy};

/// One message of a chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Build the system prompt from instructions and assembled context.
///
/// With an empty context the prompt is the instructions alone, so the model
/// answers without grounding instead of seeing a dangling header.
pub fn system_prompt(instructions: &str, context: &str) -> String {
    if context.is_empty() {
        instructions.to_string()
    } else {
        format!("{}\n\n{}", instructions, context)
    }
}

/// Produces a reply to a user message under a system prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o"`).
    fn model_name(&self) -> &str;

    /// Returns the first completion's text, trimmed.
    async fn generate(&self, system_prompt: &str, user_message: &str)
        -> Result<String, UpstreamError>;
}

/// Generator backed by the OpenAI chat-completions API.
pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
    retry: RetryPolicy,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
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
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            retry: config.retry_policy(),
        })
    }

    pub fn from_env(config: &GenerationConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::new(config, api_key)
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, UpstreamError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_message),
            ],
        });

        let response = send_with_retry("chat completion", &self.retry, || {
            self.client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        let json: Value = response.json().await?;
        parse_completion_response(&json)
    }
}

/// Extract `choices[0].message.content`, trimmed.
fn parse_completion_response(json: &Value) -> Result<String, UpstreamError> {
    let first = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| UpstreamError::InvalidResponse("no completion choices".into()))?;

    let content = first
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| UpstreamError::InvalidResponse("first choice has no content".into()))?;

    Ok(content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_prompt_appends_context() {
        assert_eq!(
            system_prompt("Answer from this:", "Refunds within 30 days."),
            "Answer from this:\n\nRefunds within 30 days."
        );
    }

    #[test]
    fn test_system_prompt_without_context() {
        assert_eq!(system_prompt("Answer from this:", ""), "Answer from this:");
    }

    #[test]
    fn test_parse_first_choice_trimmed() {
        let json = json!({
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "  Within 30 days.\n" } },
                { "index": 1, "message": { "role": "assistant", "content": "ignored" } }
            ]
        });
        assert_eq!(parse_completion_response(&json).unwrap(), "Within 30 days.");
    }

    #[test]
    fn test_parse_no_choices() {
        let err = parse_completion_response(&json!({ "choices": [] })).unwrap_err();
        assert!(err.to_string().contains("no completion choices"));
    }

    #[test]
    fn test_parse_null_content() {
        let json = json!({ "choices": [ { "message": { "role": "assistant", "content": null } } ] });
        assert!(parse_completion_response(&json).is_err());
    }

    #[test]
    fn test_message_serialization() {
        let value = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(value, json!({ "role": "user", "content": "hi" }));
    }
}
