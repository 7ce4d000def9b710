//! Data types that flow through one chat request.
//!
//! Nothing here outlives the request that created it.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`.
///
/// `message` is optional at the serde level so that a missing field is
/// reported as a validation error rather than a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Successful response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub reply: String,
}

/// Failure response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

/// One row returned by the similarity-search function, in backend rank order.
///
/// Extra columns the function returns (ids, metadata) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub similarity: f64,
}

impl RetrievedChunk {
    pub fn new(content: impl Into<String>, similarity: f64) -> Self {
        Self {
            content: content.into(),
            similarity,
        }
    }
}
