//! Weft-Crawl: the web traversal engine of a content ingestion pipeline
//!
//! This crate discovers, fetches, deduplicates, and streams HTML pages from a
//! seed URL under concurrency, rate, and scope constraints. Pages are handed to
//! the rest of the pipeline through the [`ContentSource`] interface.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod sitemap;
pub mod source;
pub mod transport;
pub mod url;

use thiserror::Error;

/// Main error type for Weft-Crawl operations
///
/// Page-level failures never reach this type; they are logged and the page is
/// skipped. Only setup failures and cancellation end a run with an error.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Crawl cancelled")]
    Cancelled,

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing start URL")]
    MissingStartUrl,

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Weft-Crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use cache::{CacheEntry, MemoryCache, ResponseCache};
pub use config::{Config, CrawlScope};
pub use crawler::{crawl, WebCrawler};
pub use source::{ContentItem, ContentSource};
pub use url::{normalize_url, PatternFilter};
