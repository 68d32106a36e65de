use crate::UrlError;
use url::Url;

/// Normalizes a URL into the canonical form used for deduplication
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Lowercase the scheme and host
/// 3. Drop the port when it is the scheme default (80 for http, 443 for https)
/// 4. Empty path becomes /
/// 5. Remove trailing slashes (except for root /)
/// 6. Remove fragment (everything after #)
/// 7. Keep the query string exactly as given
///
/// The query is not reordered because servers may be sensitive to parameter order.
/// Every step is idempotent, so normalizing an already normalized URL is a no-op.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(String)` - Normalized URL
/// * `Err(UrlError)` - The URL could not be parsed
///
/// # Examples
///
/// ```
/// use weft_crawl::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.com:80/docs/#intro").unwrap();
/// assert_eq!(url, "http://example.com/docs");
/// ```
pub fn normalize_url(url_str: &str) -> Result<String, UrlError> {
    // Step 1: Parse the URL
    let mut url =
        Url::parse(url_str.trim()).map_err(|e| UrlError::InvalidUrl(format!("{url_str}: {e}")))?;

    // Step 2: Lowercase the scheme and host
    let scheme = url.scheme().to_ascii_lowercase();
    if scheme != url.scheme() {
        url.set_scheme(&scheme)
            .map_err(|_| UrlError::InvalidUrl(format!("{url_str}: unsupported scheme")))?;
    }

    if let Some(host) = url.host_str() {
        let lowered = host.to_ascii_lowercase();
        if lowered != host {
            url.set_host(Some(&lowered))
                .map_err(|e| UrlError::InvalidUrl(format!("{url_str}: {e}")))?;
        }
    }

    // Step 3: Strip default port
    if let Some(port) = url.port() {
        let default = match url.scheme() {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        };
        if default == Some(port) {
            // Only fails for URLs that cannot carry a port, which never have one
            let _ = url.set_port(None);
        }
    }

    // Steps 4 & 5: Normalize path
    if !url.cannot_be_a_base() {
        let normalized_path = normalize_path(url.path());
        url.set_path(&normalized_path);
    }

    // Step 6: Remove fragment
    url.set_fragment(None);

    // Step 7: the query is left untouched
    Ok(url.into())
}

/// Applies the empty-path and trailing-slash rules
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
