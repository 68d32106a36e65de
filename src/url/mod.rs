//! URL handling module for Weft-Crawl
//!
//! This module provides URL normalization, allowed-domain matching, and glob
//! filtering of URL paths. Together they make up the admission decision for
//! every URL the crawler discovers.

mod filter;
mod matcher;
mod normalize;

use url::Url;

// Re-export main functions
pub use filter::{PatternFilter, DEFAULT_EXCLUDE_PATTERNS};
pub use matcher::{domain_matches, is_domain_allowed};
pub use normalize::normalize_url;

/// Computes the deduplication key for a URL
///
/// With normalization enabled this is the normalized URL. If normalization is
/// disabled, or the URL cannot be parsed, the raw string is used unchanged so a
/// bad URL never aborts a crawl.
pub fn dedup_key(raw: &str, normalize: bool) -> String {
    if !normalize {
        return raw.to_string();
    }

    match normalize_url(raw) {
        Ok(normalized) => normalized,
        Err(e) => {
            tracing::debug!("Falling back to raw URL as dedup key: {}", e);
            raw.to_string()
        }
    }
}

/// Extracts the lowercase host of a URL, including a non-default port
///
/// This is the key used for per-domain rate limiting.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use weft_crawl::url::domain_key;
///
/// let url = Url::parse("https://Docs.Example.com/page").unwrap();
/// assert_eq!(domain_key(&url), Some("docs.example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(domain_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn domain_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}
