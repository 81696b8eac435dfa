//! Retry utilities for store reads over HTTP, with exponential backoff.
//!
//! Retried:
//! - Timeouts and connection resets
//! - 5xx server errors, 408 and 429
//!
//! Not retried:
//! - Other 4xx client errors, including 401 and 403

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};

/// Default retry configuration
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// No retries at all; used by tests against mock servers
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Calculate the delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped)
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

/// Check if a reqwest error is retryable
pub fn is_retryable_error(error: &reqwest::Error) -> RetryDecision {
    if error.is_timeout() || error.is_connect() {
        return RetryDecision::Retry;
    }

    if error.is_request() {
        return RetryDecision::NoRetry;
    }

    match error.status() {
        Some(status) => is_retryable_status(status),
        None => RetryDecision::NoRetry,
    }
}

/// Check if a status code is retryable
pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        RetryDecision::Retry
    } else {
        RetryDecision::NoRetry
    }
}

/// Execute an HTTP request with retry logic.
///
/// Returns the first non-retryable response (success or not), or the
/// response/error of the final attempt once retries are exhausted.
///
/// # Errors
/// Returns the transport error of the last attempt.
pub async fn with_retry<F, Fut>(config: &RetryConfig, operation: F) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt: u32 = 0;

    loop {
        let exhausted = attempt >= config.max_retries;

        match operation().await {
            Ok(response) => {
                let status = response.status();
                if exhausted || is_retryable_status(status) == RetryDecision::NoRetry {
                    if attempt > 0 {
                        tracing::info!("Request finished with {} after {} retries", status, attempt);
                    }
                    return Ok(response);
                }
                tracing::warn!(
                    "Request returned retryable status {}, attempt {} of {}",
                    status,
                    attempt + 1,
                    config.max_retries + 1
                );
            }
            Err(e) => {
                if exhausted || is_retryable_error(&e) == RetryDecision::NoRetry {
                    tracing::debug!("Giving up on request: {}", e);
                    return Err(e);
                }
                tracing::warn!(
                    "Retryable error on attempt {} of {}: {}",
                    attempt + 1,
                    config.max_retries + 1,
                    e
                );
            }
        }

        let delay = config.delay_for_attempt(attempt);
        attempt += 1;
        tokio::time::sleep(delay).await;
    }
}
