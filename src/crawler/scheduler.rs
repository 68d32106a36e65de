//! Per-domain request gating
//!
//! This module handles:
//! - Per-domain concurrency limiting via semaphores
//! - A minimum delay between consecutive requests to the same domain
//!
//! Global concurrency is enforced separately by the coordinator when it
//! spawns workers.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Rate state for one domain
#[derive(Debug)]
struct DomainState {
    /// Limits in-flight requests to this domain
    semaphore: Arc<Semaphore>,

    /// When the last request to this domain was released
    last_request_time: Mutex<Option<Instant>>,
}

impl DomainState {
    fn new(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            last_request_time: Mutex::new(None),
        }
    }
}

/// Calculates the time until the next request can be made
///
/// Returns None if a request can be made now.
fn time_until_next_request(
    last_request_time: Option<Instant>,
    delay: Duration,
    now: Instant,
) -> Option<Duration> {
    let last = last_request_time?;
    let elapsed = now.saturating_duration_since(last);
    (elapsed < delay).then(|| delay - elapsed)
}

/// A granted slot for one request to a domain
///
/// Holding the permit counts against the domain's concurrency limit.
#[derive(Debug)]
pub struct DomainPermit {
    _permit: OwnedSemaphorePermit,
}

/// Hands out per-domain request slots
#[derive(Debug)]
pub struct DomainLimiter {
    domains: DashMap<String, Arc<DomainState>>,
    concurrency: usize,
    delay: Duration,
}

impl DomainLimiter {
    /// Creates a limiter
    ///
    /// # Arguments
    ///
    /// * `concurrency` - Maximum in-flight requests per domain
    /// * `delay` - Minimum spacing between request starts on one domain
    pub fn new(concurrency: usize, delay: Duration) -> Self {
        Self {
            domains: DashMap::new(),
            concurrency,
            delay,
        }
    }

    fn state_for(&self, domain: &str) -> Arc<DomainState> {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(DomainState::new(self.concurrency)))
            .clone()
    }

    /// Waits for a request slot on `domain`
    ///
    /// Blocks on the domain's semaphore, then sleeps until the configured
    /// delay since the previous request has passed. Both waits race `cancel`.
    ///
    /// # Returns
    ///
    /// * `Some(DomainPermit)` - The request may proceed
    /// * `None` - Cancelled while waiting
    pub async fn acquire(&self, domain: &str, cancel: &CancellationToken) -> Option<DomainPermit> {
        let state = self.state_for(domain);

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            permit = state.semaphore.clone().acquire_owned() => permit.ok()?,
        };

        let mut last = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            guard = state.last_request_time.lock() => guard,
        };

        if let Some(wait) = time_until_next_request(*last, self.delay, Instant::now()) {
            tracing::trace!("Waiting {:?} before next request to {}", wait, domain);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        *last = Some(Instant::now());
        Some(DomainPermit { _permit: permit })
    }

    /// Returns the number of domains seen so far
    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }
}
