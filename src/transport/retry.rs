//! Retry decorator with capped exponential backoff
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Connection failure / timeout | Retry |
//! | HTTP 5xx | Retry |
//! | HTTP < 500 (including 4xx) | Return immediately |
//! | Cancellation during backoff | Return last response, or `Cancelled` |
//!
//! Once the retry budget is spent the last response or error is returned as is.

use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use reqwest::{Request, Response};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backoff schedule for retried requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Additional attempts after the first one
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Cap applied to every delay
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Returns the delay before retry number `attempt` (1-based)
    ///
    /// The delay is `min(base_delay * 2^(attempt - 1), max_delay)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use weft_crawl::transport::BackoffPolicy;
    ///
    /// let policy = BackoffPolicy::default();
    /// assert_eq!(policy.delay_for(1), Duration::from_secs(1));
    /// assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    /// assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        2u32.checked_pow(attempt - 1)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Transport decorator that retries transient failures
#[derive(Debug, Clone)]
pub struct RetryTransport<T> {
    inner: T,
    policy: BackoffPolicy,
}

impl<T: Transport> RetryTransport<T> {
    pub fn new(inner: T, policy: BackoffPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}

/// Returns true when a result should be retried
fn should_retry(result: &Result<Response, TransportError>) -> bool {
    match result {
        Ok(response) => response.status().as_u16() >= 500,
        Err(e) => e.is_transient(),
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryTransport<T> {
    async fn round_trip(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        let mut attempt: u32 = 0;

        loop {
            let this_attempt = match request.try_clone() {
                Some(copy) => copy,
                None => {
                    tracing::debug!(
                        "Request body for {} cannot be replayed, sending without retry",
                        request.url()
                    );
                    return self.inner.round_trip(request, cancel).await;
                }
            };

            let result = self.inner.round_trip(this_attempt, cancel).await;
            if attempt >= self.policy.max_retries || !should_retry(&result) {
                return result;
            }

            attempt += 1;
            let delay = self.policy.delay_for(attempt);
            match &result {
                Ok(response) => tracing::debug!(
                    "HTTP {} from {}, retry {}/{} in {:?}",
                    response.status().as_u16(),
                    request.url(),
                    attempt,
                    self.policy.max_retries,
                    delay
                ),
                Err(e) => tracing::debug!(
                    "{} for {}, retry {}/{} in {:?}",
                    e,
                    request.url(),
                    attempt,
                    self.policy.max_retries,
                    delay
                ),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return match result {
                        Ok(response) => Ok(response),
                        Err(_) => Err(TransportError::Cancelled),
                    };
                }
                _ = tokio::time::sleep(delay) => {}
            }

            // Releases the previous response body before the connection is reused
            drop(result);
        }
    }
}
