/// Checks if a host matches an allowed-domain pattern
///
/// Two kinds of patterns are supported:
/// 1. Exact: "example.com" matches only "example.com"
/// 2. Wildcard: "*.example.com" matches "example.com" and any subdomain of it,
///    e.g. "docs.example.com" or "api.v2.example.com"
///
/// Both sides are compared case-insensitively.
///
/// # Examples
///
/// ```
/// use weft_crawl::url::domain_matches;
///
/// assert!(domain_matches("example.com", "EXAMPLE.com"));
/// assert!(!domain_matches("example.com", "docs.example.com"));
///
/// assert!(domain_matches("*.example.com", "example.com"));
/// assert!(domain_matches("*.example.com", "api.v2.example.com"));
/// assert!(!domain_matches("*.example.com", "notexample.com"));
/// ```
pub fn domain_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => host == base || host.ends_with(&format!(".{base}")),
        None => host == pattern,
    }
}

/// Returns true when `host` is admitted by the allowed-domain list
///
/// An empty list admits every host.
pub fn is_domain_allowed(host: &str, allowed: &[String]) -> bool {
    allowed.is_empty() || allowed.iter().any(|pattern| domain_matches(pattern, host))
}
