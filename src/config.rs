//! TOML configuration for the chat pipeline.
//!
//! Every field has a default, so the file is optional: a deployment that
//! only sets `OPENAI_API_KEY`, `SUPABASE_URL`, and `SUPABASE_KEY` in the
//! environment runs with the values below. Credentials are never read from
//! the file.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:10000"
//! request_timeout_secs = 60
//!
//! [embedding]
//! model = "text-embedding-3-small"
//!
//! [retrieval]
//! function = "match_documents"
//! match_threshold = 0.6
//! match_count = 5
//!
//! [context]
//! budget_chars = 3000
//! separator = "\n---\n"
//!
//! [generation]
//! model = "gpt-4o"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::retry::RetryPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Deadline covering embedding, retrieval, and generation together.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:10000".to_string()
}
fn default_request_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_openai_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl EmbeddingConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.backoff_base_ms))
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Project URL of the vector store. `SUPABASE_URL` takes precedence.
    #[serde(default)]
    pub url: Option<String>,
    /// Name of the remote similarity-search function.
    #[serde(default = "default_function")]
    pub function: String,
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    #[serde(default = "default_match_count")]
    pub match_count: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            url: None,
            function: default_function(),
            match_threshold: default_match_threshold(),
            match_count: default_match_count(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl RetrievalConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.backoff_base_ms))
    }
}

fn default_function() -> String {
    "match_documents".to_string()
}
fn default_match_threshold() -> f64 {
    0.6
}
fn default_match_count() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    /// Upper bound on the assembled context, in characters.
    #[serde(default = "default_budget_chars")]
    pub budget_chars: usize,
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget_chars: default_budget_chars(),
            separator: default_separator(),
        }
    }
}

fn default_budget_chars() -> usize {
    3000
}
fn default_separator() -> String {
    "\n---\n".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Text placed ahead of the retrieved context in the system prompt.
    #[serde(default = "default_instructions")]
    pub instructions: String,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            base_url: default_openai_base_url(),
            instructions: default_instructions(),
            timeout_secs: default_generation_timeout_secs(),
            max_retries: 0,
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl GenerationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.backoff_base_ms))
    }
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}
fn default_instructions() -> String {
    "You are a helpful assistant answering questions based on the following context:".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Check value ranges. Called by [`load_config`]; exposed for configs
    /// built in code.
    pub fn validate(&self) -> Result<()> {
        if self.server.request_timeout_secs == 0 {
            anyhow::bail!("server.request_timeout_secs must be > 0");
        }
        parse_port(&self.server.bind)?;

        for (name, secs) in [
            ("embedding.timeout_secs", self.embedding.timeout_secs),
            ("retrieval.timeout_secs", self.retrieval.timeout_secs),
            ("generation.timeout_secs", self.generation.timeout_secs),
        ] {
            if secs == 0 {
                anyhow::bail!("{} must be > 0", name);
            }
        }

        if self.embedding.model.trim().is_empty() {
            anyhow::bail!("embedding.model must not be empty");
        }
        if self.generation.model.trim().is_empty() {
            anyhow::bail!("generation.model must not be empty");
        }

        if self.retrieval.function.trim().is_empty() {
            anyhow::bail!("retrieval.function must not be empty");
        }
        if !(-1.0..=1.0).contains(&self.retrieval.match_threshold) {
            anyhow::bail!("retrieval.match_threshold must be in [-1.0, 1.0]");
        }
        if self.retrieval.match_count < 1 {
            anyhow::bail!("retrieval.match_count must be >= 1");
        }

        if self.context.budget_chars == 0 {
            anyhow::bail!("context.budget_chars must be > 0");
        }

        Ok(())
    }

    /// Replace the port of `server.bind`, keeping the host.
    pub fn override_port(&mut self, port: &str) -> Result<()> {
        let port: u16 = port
            .trim()
            .parse()
            .with_context(|| format!("Invalid PORT value: '{}'", port))?;
        let host = match self.server.bind.rsplit_once(':') {
            Some((host, _)) => host,
            None => self.server.bind.as_str(),
        };
        self.server.bind = format!("{}:{}", host, port);
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

fn parse_port(bind: &str) -> Result<u16> {
    let (_, port) = bind
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("server.bind must be host:port, got '{}'", bind))?;
    port.parse::<u16>()
        .with_context(|| format!("server.bind has an invalid port: '{}'", bind))
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist, then apply environment overrides (`PORT`,
/// `SUPABASE_URL`) and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str::<Config>(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    if let Ok(port) = std::env::var("PORT") {
        config.override_port(&port)?;
    }
    if let Ok(url) = std::env::var("SUPABASE_URL") {
        if !url.trim().is_empty() {
            config.retrieval.url = Some(url);
        }
    }

    config.validate()?;
    Ok(config)
}
