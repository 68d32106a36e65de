//! Crawler module for web page traversal
//!
//! This module contains the core crawling logic, including:
//! - Page fetching through the response cache and retrying transport
//! - HTML parsing and link extraction
//! - Per-domain rate limiting
//! - Overall crawl coordination and per-run state

mod coordinator;
mod engine;
mod fetcher;
mod parser;
mod scheduler;
mod session;

pub use coordinator::Coordinator;
pub use engine::WebCrawler;
pub use fetcher::{FetchError, FetchResult, Fetcher};
pub use parser::{extract_page_title, parse_html, ParsedPage};
pub use scheduler::{DomainLimiter, DomainPermit};
pub use session::{CrawlPhase, CrawlSession};

use crate::config::Config;
use crate::source::{ContentItem, ContentSource};
use crate::CrawlError;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl and collects every emitted page
///
/// This is a convenience wrapper over [`WebCrawler`] and
/// [`ContentSource::traverse`] for callers that do not need streaming.
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `cancel` - Token that stops the crawl early
///
/// # Returns
///
/// * `Ok(Vec<ContentItem>)` - Crawl completed
/// * `Err(CrawlError)` - Invalid configuration, or the crawl was cancelled
pub async fn crawl(
    config: Config,
    cancel: CancellationToken,
) -> Result<Vec<ContentItem>, CrawlError> {
    let crawler = WebCrawler::new(config)?;
    let (mut items, mut errors) = crawler.traverse(cancel);

    let mut collected = Vec::new();
    while let Some(item) = items.recv().await {
        collected.push(item);
    }

    match errors.recv().await {
        Some(e) => Err(e),
        None => Ok(collected),
    }
}
