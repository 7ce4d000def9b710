//! Error types for the chat pipeline.
//!
//! [`UpstreamError`] describes what went wrong talking to one external API.
//! [`ChatError`] records which pipeline stage failed and decides what the
//! caller is allowed to see.

use std::time::Duration;

use thiserror::Error;

/// A failure reported by, or while talking to, an external API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The API answered 2xx but the payload was not what we expected.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            // A builder error is a bad URL or header; it fails the same way every time.
            UpstreamError::Transport(e) => !e.is_builder(),
            UpstreamError::Status { status, .. } => {
                status.as_u16() == 429 || status.is_server_error()
            }
            UpstreamError::InvalidResponse(_) => false,
        }
    }
}

/// Errors that end a chat request.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request carried no usable message. No external call was made.
    #[error("message is required")]
    Validation,

    #[error("embedding failed: {0}")]
    Embedding(#[source] UpstreamError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] UpstreamError),

    #[error("generation failed: {0}")]
    Generation(#[source] UpstreamError),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl ChatError {
    /// True for errors caused by the caller rather than an upstream.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ChatError::Validation)
    }

    /// Message safe to return to the caller. Upstream details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            ChatError::Validation => "Message is required.",
            ChatError::Timeout(_) => "Timed out generating a response.",
            ChatError::Embedding(_) | ChatError::Retrieval(_) | ChatError::Generation(_) => {
                "Error generating response."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transience() {
        let rate_limited = UpstreamError::Status {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
        };
        let unavailable = UpstreamError::Status {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        };
        let unauthorized = UpstreamError::Status {
            status: reqwest::StatusCode::UNAUTHORIZED,
            body: String::new(),
        };
        assert!(rate_limited.is_transient());
        assert!(unavailable.is_transient());
        assert!(!unauthorized.is_transient());
        assert!(!UpstreamError::InvalidResponse("x".into()).is_transient());
    }

    #[test]
    fn test_builder_error_is_not_transient() {
        let err = reqwest::Client::new()
            .post("relative/embeddings")
            .build()
            .unwrap_err();
        assert!(err.is_builder());
        assert!(!UpstreamError::Transport(err).is_transient());
    }

    #[test]
    fn test_public_message_hides_upstream_detail() {
        let err = ChatError::Generation(UpstreamError::Status {
            status: reqwest::StatusCode::BAD_REQUEST,
            body: "secret org id org-123".into(),
        });
        assert!(err.to_string().contains("org-123"));
        assert!(!err.public_message().contains("org-123"));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_validation_is_client_error() {
        assert!(ChatError::Validation.is_client_error());
        assert_eq!(ChatError::Validation.public_message(), "Message is required.");
    }
}
