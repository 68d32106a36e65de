use crate::config::types::{CacheConfig, Config, CrawlConfig, RetryConfig, SitemapConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_sitemap_config(&config.sitemap)?;
    validate_retry_config(&config.retry)?;
    validate_cache_config(&config.cache)?;
    Ok(())
}

/// Validates crawl scope configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    let start_url = config.start_url.trim();
    if start_url.is_empty() {
        return Err(ConfigError::MissingStartUrl);
    }

    validate_http_url("start_url", start_url)?;

    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    for domain in &config.allowed_domains {
        validate_domain_pattern(domain)?;
    }

    Ok(())
}

/// Validates sitemap configuration
fn validate_sitemap_config(config: &SitemapConfig) -> Result<(), ConfigError> {
    if let Some(url) = &config.url {
        validate_http_url("sitemap url", url)?;
    }
    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base_delay_ms ({}) cannot exceed max_delay_ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

/// Validates cache configuration
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.enabled && config.max_items < 1 {
        return Err(ConfigError::Validation(
            "cache max_items must be >= 1 when the cache is enabled".to_string(),
        ));
    }
    Ok(())
}

/// Validates that a URL parses and uses http or https
fn validate_http_url(field: &str, raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {field} '{raw}': {e}")))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{field} '{raw}' must use http or https"
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{field} '{raw}' has no host"
        )));
    }

    Ok(())
}

/// Validates an allowed-domain pattern (supports a leading "*." wildcard)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);

    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            pattern
        )));
    }

    let domain = match domain.split_once(':') {
        Some((host, port)) => {
            if host.is_empty() || port.parse::<u16>().is_err() {
                return Err(ConfigError::InvalidPattern(format!(
                    "Domain '{}' has an invalid port",
                    pattern
                )));
            }
            host
        }
        None => domain,
    };

    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' has a misplaced '.'",
            pattern
        )));
    }

    Ok(())
}
