//! Retry policy with linear backoff and throttling cool-down.
//!
//! Ordinary failures (timeouts, connection errors, unexpected status codes)
//! wait `base_delay * attempt` before the next attempt. A `418 I'm a teapot`
//! reply is the service's anti-automation signal and waits
//! `base_delay * attempt * throttle_multiplier` instead.
//!
//! # Example
//!
//! ```ignore
//! let policy = RetryPolicy::new(5, Duration::from_secs(3), 2);
//! let value = policy.run("tracks", |attempt| async move {
//!     fetch(attempt).await
//! }).await?;
//! ```

use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;

use super::TransportError;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

/// Why a single attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("throttled by service (HTTP 418)")]
    Throttled,

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    /// Local failure that another attempt cannot fix (e.g. disk write).
    #[error("{0}")]
    Fatal(String),
}

impl AttemptError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AttemptError::Timeout
        } else {
            AttemptError::Network(err.to_string())
        }
    }
}

impl IsRetryable for AttemptError {
    fn is_retryable(&self) -> bool {
        !matches!(self, AttemptError::Fatal(_))
    }
}

/// Attempt cap plus the two delay schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub throttle_multiplier: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, throttle_multiplier: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            throttle_multiplier,
        }
    }

    /// Wait after ordinary failure of the zero-based `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }

    /// Wait after a throttling reply on the zero-based `attempt`.
    pub fn cooldown(&self, attempt: u32) -> Duration {
        self.backoff(attempt) * self.throttle_multiplier
    }

    /// Run `operation` until it succeeds, fails fatally or attempts run out.
    ///
    /// `target` only labels log lines and the exhaustion error.
    pub async fn run<F, Fut, T>(&self, target: &str, mut operation: F) -> Result<T, TransportError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            let is_last = attempt + 1 == self.max_attempts;

            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(target_url = target, attempts = attempt + 1, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!(target_url = target, error = %e, "Request failed with non-retryable error");
                    return Err(TransportError::Aborted {
                        target: target.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(AttemptError::Throttled) => {
                    let wait = self.cooldown(attempt);
                    tracing::warn!(
                        target_url = target,
                        attempt = attempt + 1,
                        wait_ms = wait.as_millis() as u64,
                        "Throttled by service, cooling down"
                    );
                    last_error = Some(AttemptError::Throttled);
                    if !is_last {
                        tokio::time::sleep(wait).await;
                    }
                }
                Err(e) => {
                    let wait = self.backoff(attempt);
                    tracing::warn!(
                        target_url = target,
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        "Request failed"
                    );
                    last_error = Some(e);
                    if !is_last {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        let throttled = matches!(last_error, Some(AttemptError::Throttled));
        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        tracing::error!(
            target_url = target,
            attempts = self.max_attempts,
            error = %last_error,
            "Request failed after all retry attempts exhausted"
        );
        Err(TransportError::Exhausted {
            target: target.to_string(),
            attempts: self.max_attempts,
            throttled,
            last_error,
        })
    }
}
