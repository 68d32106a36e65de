use crate::url::DEFAULT_EXCLUDE_PATTERNS;
use serde::Deserialize;

/// Main configuration structure for Weft-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub sitemap: SitemapConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Config {
    /// Creates a configuration for a start URL with every other setting defaulted
    pub fn for_start_url(start_url: impl Into<String>) -> Self {
        Self {
            crawl: CrawlConfig {
                start_url: start_url.into(),
                ..CrawlConfig::default()
            },
            sitemap: SitemapConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Crawl scope and politeness configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlConfig {
    /// URL the link-following phase starts from
    pub start_url: String,

    /// Hosts the crawl may visit; empty means the start URL host only
    pub allowed_domains: Vec<String>,

    /// Glob patterns a URL path must match (empty means everything)
    pub include_patterns: Vec<String>,

    /// Glob patterns that reject a URL path
    pub exclude_patterns: Vec<String>,

    /// Maximum number of link hops from the start URL (0 means unlimited)
    pub max_depth: u32,

    /// Maximum number of pages emitted (0 means unlimited)
    pub max_pages: usize,

    /// Maximum number of parallel fetches per domain
    pub concurrency: usize,

    /// Minimum time between requests to the same domain (milliseconds)
    pub request_delay_ms: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Whether URLs are normalized before deduplication; unset means enabled
    pub normalize_urls: Option<bool>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            allowed_domains: Vec::new(),
            include_patterns: Vec::new(),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            max_depth: 3,
            max_pages: 1000,
            concurrency: 2,
            request_delay_ms: 1000,
            user_agent: format!("weft-crawl/{}", env!("CARGO_PKG_VERSION")),
            normalize_urls: None,
        }
    }
}

/// Sitemap discovery configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SitemapConfig {
    /// Seed the crawl from the sitemap before following links
    pub enabled: bool,

    /// Only crawl sitemap URLs, never follow in-page links
    pub only: bool,

    /// Sitemap location; defaults to `/sitemap.xml` on the start URL origin
    pub url: Option<String>,
}

/// Retry/backoff configuration for the HTTP transport
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RetryConfig {
    /// Additional attempts after the first request
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds)
    pub base_delay_ms: u64,

    /// Upper bound on any single retry delay (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

/// In-memory response cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CacheConfig {
    /// Whether fetched bodies are cached
    pub enabled: bool,

    /// How long a cached body stays valid (seconds)
    pub ttl_secs: u64,

    /// Maximum number of cached bodies
    pub max_items: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
            max_items: 1000,
        }
    }
}
