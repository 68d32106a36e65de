//! HTTP transport layer
//!
//! A [`Transport`] performs one request/response exchange. Transports compose:
//! [`RetryTransport`] wraps any other transport and adds bounded exponential
//! backoff, while [`HttpTransport`] is the leaf that talks to the network
//! through a shared `reqwest::Client`.

mod retry;

pub use retry::{BackoffPolicy, RetryTransport};

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Request, Response};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Fixed per-request timeout, independent of the retry budget
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    /// Returns true if the error is worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Request(_))
    }
}

/// A single HTTP round trip
///
/// Implementations must observe `cancel` while waiting on the network and
/// return [`TransportError::Cancelled`] once it fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn round_trip(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        (**self).round_trip(request, cancel).await
    }
}

/// Network transport backed by a `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.client.execute(request) => result.map_err(TransportError::from),
        }
    }
}

/// Builds the HTTP client shared by page and sitemap fetches
///
/// # Arguments
///
/// * `user_agent` - The User-Agent header sent with every request
///
/// # Example
///
/// ```no_run
/// use weft_crawl::transport::build_http_client;
///
/// let client = build_http_client("weft-crawl/0.1 (+https://example.com/bot)").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}
