//! Glob-based include/exclude filtering of URL paths

use glob::{MatchOptions, Pattern};

/// Options used for every path match
///
/// `*` stays within one path segment while `**` spans segments.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Exclude patterns applied when the configuration does not provide any
///
/// These skip static assets and endpoints that never carry document content.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "/**/*.css",
    "/**/*.js",
    "/**/*.mjs",
    "/**/*.map",
    "/**/*.json",
    "/**/*.png",
    "/**/*.jpg",
    "/**/*.jpeg",
    "/**/*.gif",
    "/**/*.svg",
    "/**/*.webp",
    "/**/*.ico",
    "/**/*.woff",
    "/**/*.woff2",
    "/**/*.ttf",
    "/**/*.eot",
    "/**/*.mp4",
    "/**/*.mp3",
    "/**/*.zip",
    "/**/*.gz",
    "/api/**",
    "/search/**",
];

/// A compiled glob pattern, or `None` when the source was malformed
#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    pattern: Option<Pattern>,
}

impl CompiledPattern {
    fn compile(source: &str) -> Self {
        let pattern = match Pattern::new(source) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!("Ignoring malformed glob pattern '{}': {}", source, e);
                None
            }
        };

        Self {
            source: source.to_string(),
            pattern,
        }
    }

    fn matches(&self, path: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|p| p.matches_with(path, MATCH_OPTIONS))
    }
}

/// Include/exclude decision over URL paths
///
/// Excludes dominate includes. With no include patterns, every path that is not
/// excluded is allowed; otherwise the path must match at least one include.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    includes: Vec<CompiledPattern>,
    excludes: Vec<CompiledPattern>,
}

impl PatternFilter {
    /// Compiles a filter from raw glob strings
    ///
    /// Malformed patterns are logged and kept as patterns that never match, so a
    /// malformed include still makes the include list non-empty.
    pub fn new<I, E>(includes: I, excludes: E) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            includes: includes
                .into_iter()
                .map(|p| CompiledPattern::compile(p.as_ref()))
                .collect(),
            excludes: excludes
                .into_iter()
                .map(|p| CompiledPattern::compile(p.as_ref()))
                .collect(),
        }
    }

    /// Returns true if a URL path passes the filter
    ///
    /// # Examples
    ///
    /// ```
    /// use weft_crawl::url::PatternFilter;
    ///
    /// let filter = PatternFilter::new(["/docs/**"], ["/**/*.css"]);
    /// assert!(filter.allow("/docs/guide"));
    /// assert!(!filter.allow("/docs/theme.css"));
    /// assert!(!filter.allow("/blog/post"));
    /// ```
    pub fn allow(&self, path: &str) -> bool {
        let path = if path.is_empty() { "/" } else { path };

        if let Some(exclude) = self.excludes.iter().find(|p| p.matches(path)) {
            tracing::trace!("Path {} excluded by '{}'", path, exclude.source);
            return false;
        }

        if self.includes.is_empty() {
            return true;
        }

        self.includes.iter().any(|p| p.matches(path))
    }
}
