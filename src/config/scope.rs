use crate::config::types::Config;
use crate::config::validation::validate;
use crate::transport::BackoffPolicy;
use crate::url::{domain_key, is_domain_allowed, PatternFilter};
use crate::ConfigError;
use std::time::Duration;
use url::Url;

/// Immutable snapshot of everything that bounds one crawl
///
/// Built once from a validated [`Config`] when the engine is constructed and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CrawlScope {
    pub start_url: Url,
    pub allowed_domains: Vec<String>,
    pub filter: PatternFilter,
    pub max_depth: u32,
    pub max_pages: usize,
    pub concurrency: usize,
    pub request_delay: Duration,
    pub user_agent: String,
    pub normalize_urls: bool,
    pub sitemap_enabled: bool,
    pub sitemap_only: bool,
    pub sitemap_url: Url,
    pub backoff: BackoffPolicy,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub cache_max_items: usize,
}

impl CrawlScope {
    /// Validates a configuration and freezes it into a scope
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlScope)` - The configuration is valid
    /// * `Err(ConfigError)` - A required value is missing or out of range
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        validate(config)?;

        let start_url = Url::parse(config.crawl.start_url.trim())
            .map_err(|e| ConfigError::InvalidUrl(format!("start_url: {e}")))?;

        let allowed_domains = if config.crawl.allowed_domains.is_empty() {
            start_url
                .host_str()
                .map(|host| vec![host.to_ascii_lowercase()])
                .unwrap_or_default()
        } else {
            config.crawl.allowed_domains.clone()
        };

        let sitemap_url = match &config.sitemap.url {
            Some(raw) => Url::parse(raw)
                .map_err(|e| ConfigError::InvalidUrl(format!("sitemap url: {e}")))?,
            None => start_url
                .join("/sitemap.xml")
                .map_err(|e| ConfigError::InvalidUrl(format!("sitemap url: {e}")))?,
        };

        Ok(Self {
            filter: PatternFilter::new(
                &config.crawl.include_patterns,
                &config.crawl.exclude_patterns,
            ),
            allowed_domains,
            max_depth: config.crawl.max_depth,
            max_pages: config.crawl.max_pages,
            concurrency: config.crawl.concurrency,
            request_delay: Duration::from_millis(config.crawl.request_delay_ms),
            user_agent: config.crawl.user_agent.clone(),
            normalize_urls: config.crawl.normalize_urls.unwrap_or(true),
            sitemap_enabled: config.sitemap.enabled || config.sitemap.only,
            sitemap_only: config.sitemap.only,
            sitemap_url,
            backoff: BackoffPolicy {
                max_retries: config.retry.max_retries,
                base_delay: Duration::from_millis(config.retry.base_delay_ms),
                max_delay: Duration::from_millis(config.retry.max_delay_ms),
            },
            cache_enabled: config.cache.enabled,
            cache_ttl: Duration::from_secs(config.cache.ttl_secs),
            cache_max_items: config.cache.max_items,
            start_url,
        })
    }

    /// Returns true if link following is part of this crawl
    pub fn follows_links(&self) -> bool {
        !self.sitemap_only
    }

    /// Returns true if a URL at `depth` link hops may be scheduled
    pub fn within_depth(&self, depth: u32) -> bool {
        self.max_depth == 0 || depth <= self.max_depth
    }

    /// Returns true if the URL's host is inside the allowed domains
    ///
    /// Patterns written as `host:port` only match URLs on that port; the
    /// scheme's default port counts when the URL leaves it implicit.
    pub fn is_in_domain(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if is_domain_allowed(host, &self.allowed_domains) {
            return true;
        }

        match url.port_or_known_default() {
            Some(port) => is_domain_allowed(&format!("{host}:{port}"), &self.allowed_domains),
            None => false,
        }
    }

    /// Returns the per-domain limiter key for a URL
    pub fn domain_of(&self, url: &Url) -> String {
        domain_key(url).unwrap_or_default()
    }
}
