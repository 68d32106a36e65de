//! Sitemap resolution
//!
//! This module fetches sitemaps and expands sitemap indexes into the list of
//! page URLs they reference:
//! - A `<sitemapindex>` with at least one entry is expanded recursively
//! - Anything else must parse as a `<urlset>`
//! - Each sitemap URL is fetched at most once per resolution, so
//!   self-referencing indexes terminate
//! - A failing nested sitemap is logged and skipped; its siblings still resolve

mod parser;

pub use parser::{parse_sitemap_index, parse_urlset, SitemapEntry};

use crate::transport::{Transport, TransportError, REQUEST_TIMEOUT};
use crate::url::PatternFilter;
use futures::future::BoxFuture;
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Sitemap-specific errors
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("Failed to fetch sitemap {url}: {source}")]
    Fetch {
        url: String,
        source: TransportError,
    },

    #[error("Failed to build sitemap request for {url}: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("Sitemap {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed sitemap {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("Sitemap resolution cancelled")]
    Cancelled,
}

/// Resolves sitemap URLs into page URLs
pub struct SitemapResolver {
    client: Client,
    transport: Arc<dyn Transport>,
    user_agent: String,
    filter: PatternFilter,
}

impl SitemapResolver {
    /// Creates a resolver
    ///
    /// # Arguments
    ///
    /// * `client` - Client used to build requests
    /// * `transport` - Transport (normally retrying) that executes them
    /// * `user_agent` - User-Agent header for sitemap requests
    /// * `filter` - Path filter applied to the resolved page URLs
    pub fn new(
        client: Client,
        transport: Arc<dyn Transport>,
        user_agent: impl Into<String>,
        filter: PatternFilter,
    ) -> Self {
        Self {
            client,
            transport,
            user_agent: user_agent.into(),
            filter,
        }
    }

    /// Fetches a sitemap and returns the filtered page URLs it references
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<String>)` - Page URLs in document order, without duplicates
    /// * `Err(SitemapError)` - The top-level sitemap could not be fetched or parsed
    pub async fn fetch_urls(
        &self,
        sitemap_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, SitemapError> {
        let mut visited = HashSet::new();
        let entries = self.resolve(sitemap_url.to_string(), &mut visited, cancel).await?;

        tracing::debug!(
            "Sitemap {} expanded through {} sitemap(s) into {} entries",
            sitemap_url,
            visited.len(),
            entries.len()
        );

        let mut seen = HashSet::new();
        let urls = entries
            .into_iter()
            .filter(|entry| self.admits(&entry.loc))
            .filter(|entry| seen.insert(entry.loc.clone()))
            .map(|entry| entry.loc)
            .collect();

        Ok(urls)
    }

    /// Returns true if the entry's path passes the pattern filter
    fn admits(&self, loc: &str) -> bool {
        match Url::parse(loc) {
            Ok(url) => self.filter.allow(url.path()),
            Err(e) => {
                tracing::debug!("Skipping unparsable sitemap entry {}: {}", loc, e);
                false
            }
        }
    }

    /// Resolves one sitemap, recursing through indexes
    fn resolve<'a>(
        &'a self,
        sitemap_url: String,
        visited: &'a mut HashSet<String>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<SitemapEntry>, SitemapError>> {
        Box::pin(async move {
            if !visited.insert(sitemap_url.clone()) {
                tracing::debug!("Sitemap {} already resolved, skipping", sitemap_url);
                return Ok(Vec::new());
            }

            let body = self.fetch_body(&sitemap_url, cancel).await?;

            if let Ok(nested) = parse_sitemap_index(&body) {
                if !nested.is_empty() {
                    tracing::info!(
                        "Sitemap index {} lists {} sitemaps",
                        sitemap_url,
                        nested.len()
                    );

                    let mut entries = Vec::new();
                    for child in nested {
                        match self.resolve(child.loc.clone(), visited, cancel).await {
                            Ok(found) => entries.extend(found),
                            Err(SitemapError::Cancelled) => return Err(SitemapError::Cancelled),
                            Err(e) => tracing::warn!("Skipping nested sitemap: {}", e),
                        }
                    }
                    return Ok(entries);
                }
            }

            parse_urlset(&body).map_err(|message| SitemapError::Malformed {
                url: sitemap_url.clone(),
                message,
            })
        })
    }

    /// Fetches a sitemap body, treating any status other than 200 as an error
    async fn fetch_body(
        &self,
        sitemap_url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, SitemapError> {
        let request = self
            .client
            .get(sitemap_url)
            .header(USER_AGENT, &self.user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| SitemapError::Request {
                url: sitemap_url.to_string(),
                source,
            })?;

        let response = match self.transport.round_trip(request, cancel).await {
            Ok(response) => response,
            Err(TransportError::Cancelled) => return Err(SitemapError::Cancelled),
            Err(source) => {
                return Err(SitemapError::Fetch {
                    url: sitemap_url.to_string(),
                    source,
                })
            }
        };

        if response.status() != StatusCode::OK {
            return Err(SitemapError::Status {
                url: sitemap_url.to_string(),
                status: response.status().as_u16(),
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SitemapError::Cancelled),
            body = response.text() => body.map_err(|source| SitemapError::Fetch {
                url: sitemap_url.to_string(),
                source: TransportError::Request(source),
            }),
        }
    }
}
