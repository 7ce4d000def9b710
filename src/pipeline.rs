//! The retrieval-augmented chat pipeline.
//!
//! ```text
//! message ─▶ validate ─▶ embed ─▶ retrieve ─▶ assemble ─▶ generate ─▶ reply
//! ```
//!
//! Each stage depends on the previous one, so the calls run strictly in
//! sequence. Validation happens before any external call. The whole run is
//! bounded by `server.request_timeout_secs`; dropping the future returned by
//! [`ChatPipeline::answer`] cancels whichever outbound request is in flight.
//!
//! Collaborators are trait objects so tests can substitute doubles:
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use grounded_chat::config::Config;
//! # use grounded_chat::pipeline::{ChatPipeline, PipelineSettings};
//! # fn example(
//! #     embedder: Arc<dyn grounded_chat::embedding::Embedder>,
//! #     retriever: Arc<dyn grounded_chat::retrieval::Retriever>,
//! #     generator: Arc<dyn grounded_chat::generation::Generator>,
//! # ) {
//! let settings = PipelineSettings::from_config(&Config::default());
//! let pipeline = ChatPipeline::new(embedder, retriever, generator, settings);
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::{Config, ContextConfig};
use crate::context::assemble_with;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::ChatError;
use crate::generation::{system_prompt, Generator, OpenAIGenerator};
use crate::models::{ChatReply, RetrievedChunk};
use crate::retrieval::{MatchQuery, Retriever, SupabaseRetriever};

/// Per-pipeline knobs, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub match_threshold: f64,
    pub match_count: usize,
    pub context: ContextConfig,
    pub instructions: String,
    pub request_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            match_threshold: config.retrieval.match_threshold,
            match_count: config.retrieval.match_count,
            context: config.context.clone(),
            instructions: config.generation.instructions.clone(),
            request_timeout: config.request_timeout(),
        }
    }
}

/// Chunks found for a message and the context assembled from them.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub chunks: Vec<RetrievedChunk>,
    pub context: String,
}

/// Embedder, retriever, and generator wired into one request handler.
pub struct ChatPipeline {
    embedder: Arc<dyn Embedder>,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    settings: PipelineSettings,
}

impl ChatPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder,
            retriever,
            generator,
            settings,
        }
    }

    /// Build the pipeline with the OpenAI and Supabase clients, reading
    /// credentials from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY`, `SUPABASE_URL`, or
    /// `SUPABASE_KEY` is missing.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = OpenAIEmbedder::from_env(&config.embedding)?;
        let retriever = SupabaseRetriever::from_env(&config.retrieval)?;
        let generator = OpenAIGenerator::from_env(&config.generation)?;

        info!(
            embedding_model = embedder.model_name(),
            chat_model = generator.model_name(),
            match_threshold = config.retrieval.match_threshold,
            match_count = config.retrieval.match_count,
            "pipeline configured"
        );

        Ok(Self::new(
            Arc::new(embedder),
            Arc::new(retriever),
            Arc::new(generator),
            PipelineSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Answer `message` with grounding from the vector store.
    ///
    /// # Errors
    ///
    /// - [`ChatError::Validation`] for a blank message, before any external call.
    /// - [`ChatError::Embedding`], [`ChatError::Retrieval`], or
    ///   [`ChatError::Generation`] when that stage's API fails.
    /// - [`ChatError::Timeout`] when the request deadline passes.
    pub async fn answer(&self, message: &str) -> Result<ChatReply, ChatError> {
        let message = validate_message(message)?;
        info!(message_len = message.len(), "chat request accepted");
        self.with_deadline(self.run(message)).await
    }

    /// Embed and retrieve only, without generating a reply.
    pub async fn retrieve(&self, message: &str) -> Result<Retrieval, ChatError> {
        let message = validate_message(message)?;
        self.with_deadline(self.retrieve_validated(message)).await
    }

    async fn run(&self, message: &str) -> Result<ChatReply, ChatError> {
        let retrieval = self.retrieve_validated(message).await?;
        let prompt = system_prompt(&self.settings.instructions, &retrieval.context);

        let reply = self
            .generator
            .generate(&prompt, message)
            .await
            .map_err(|e| {
                error!(model = self.generator.model_name(), error = %e, "generation failed");
                ChatError::Generation(e)
            })?;

        info!(reply_len = reply.len(), "reply generated");
        Ok(ChatReply { reply })
    }

    async fn retrieve_validated(&self, message: &str) -> Result<Retrieval, ChatError> {
        let embedding = self.embedder.embed(message).await.map_err(|e| {
            error!(model = self.embedder.model_name(), error = %e, "embedding failed");
            ChatError::Embedding(e)
        })?;
        debug!(
            dims = embedding.len(),
            preview = ?&embedding[..embedding.len().min(5)],
            "embedding generated"
        );

        let query = MatchQuery {
            embedding: &embedding,
            match_threshold: self.settings.match_threshold,
            match_count: self.settings.match_count,
        };
        let chunks = self.retriever.retrieve(&query).await.map_err(|e| {
            error!(error = %e, "vector search failed");
            ChatError::Retrieval(e)
        })?;

        let similarities: Vec<f64> = chunks.iter().map(|c| c.similarity).collect();
        info!(chunks = chunks.len(), ?similarities, "retrieved matching chunks");

        let context = assemble_with(&chunks, &self.settings.context);
        debug!(context_chars = context.chars().count(), "context assembled");

        Ok(Retrieval { chunks, context })
    }

    async fn with_deadline<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, ChatError>>,
    ) -> Result<T, ChatError> {
        let deadline = self.settings.request_timeout;
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                error!(timeout_secs = deadline.as_secs_f64(), "request deadline exceeded");
                Err(ChatError::Timeout(deadline))
            }
        }
    }
}

/// Reject messages that are empty or whitespace only.
pub fn validate_message(message: &str) -> Result<&str, ChatError> {
    if message.trim().is_empty() {
        Err(ChatError::Validation)
    } else {
        Ok(message)
    }
}
