//! Bounded retry with exponential backoff for outbound API calls.
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: base, 2×base, 4×base, ... (exponent capped at 5)

use std::time::Duration;

use tracing::warn;

use crate::error::UpstreamError;

/// How many times to retry and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(5);
        self.base_delay * (1u32 << exponent)
    }
}

/// Send the request produced by `build` until it succeeds, fails
/// permanently, or the retry budget runs out.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed
/// by `send`. On success the raw response is returned for the caller to
/// decode.
pub async fn send_with_retry<F>(
    service: &str,
    policy: &RetryPolicy,
    mut build: F,
) -> Result<reqwest::Response, UpstreamError>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            if let Some(err) = &last_err {
                warn!(service, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
            }
            tokio::time::sleep(delay).await;
        }

        let err = match build().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                UpstreamError::Status { status, body }
            }
            Err(e) => UpstreamError::Transport(e),
        };

        if !err.is_transient() {
            return Err(err);
        }
        last_err = Some(err);
    }

    Err(last_err.unwrap_or_else(|| {
        UpstreamError::InvalidResponse(format!("{} failed after retries", service))
    }))
}
