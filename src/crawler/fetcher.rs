//! Page fetcher
//!
//! This module handles all page requests for the crawler, including:
//! - Consulting the response cache before touching the network
//! - Building requests with the configured user agent and timeout
//! - Reading bodies under cancellation
//! - Storing successful responses back into the cache

use crate::cache::ResponseCache;
use crate::transport::{Transport, TransportError, REQUEST_TIMEOUT};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result of a fetch operation
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Final URL after redirects
    pub final_url: String,

    /// HTTP status code
    pub status_code: u16,

    /// Content-Type header value, empty when absent
    pub content_type: String,

    /// Page body
    pub body: Vec<u8>,

    /// Whether the body came from the response cache
    pub from_cache: bool,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn is_html(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("text/html")
    }
}

/// Why a single page could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build request: {0}")]
    Request(reqwest::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to read body: {0}")]
    Body(reqwest::Error),

    #[error("fetch cancelled")]
    Cancelled,
}

/// Fetches pages through an optional cache and a transport
pub struct Fetcher {
    client: Client,
    transport: Arc<dyn Transport>,
    cache: Option<Arc<dyn ResponseCache>>,
    user_agent: String,
}

impl Fetcher {
    pub fn new(
        client: Client,
        transport: Arc<dyn Transport>,
        cache: Option<Arc<dyn ResponseCache>>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            transport,
            cache,
            user_agent: user_agent.into(),
        }
    }

    /// Fetches `url`, using `cache_key` for cache lookups and stores
    ///
    /// Only 2xx responses are cached. Non-2xx responses are returned as a
    /// [`FetchResult`] so the caller decides how to treat them.
    pub async fn fetch(
        &self,
        url: &str,
        cache_key: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchResult, FetchError> {
        if let Some(entry) = self.cache.as_ref().and_then(|cache| cache.get(cache_key)) {
            tracing::debug!("Cache hit for {}", cache_key);
            return Ok(FetchResult {
                final_url: url.to_string(),
                status_code: entry.status_code,
                content_type: entry.content_type,
                body: entry.body,
                from_cache: true,
            });
        }

        let request = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(FetchError::Request)?;

        let response = match self.transport.round_trip(request, cancel).await {
            Ok(response) => response,
            Err(TransportError::Cancelled) => return Err(FetchError::Cancelled),
            Err(e) => return Err(e.into()),
        };

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            bytes = response.bytes() => bytes.map_err(FetchError::Body)?.to_vec(),
        };

        let result = FetchResult {
            final_url,
            status_code,
            content_type,
            body,
            from_cache: false,
        };

        if result.is_success() {
            if let Some(cache) = &self.cache {
                cache.set(
                    cache_key,
                    result.body.clone(),
                    &result.content_type,
                    result.status_code,
                );
            }
        }

        Ok(result)
    }
}
