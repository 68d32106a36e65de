//! Response caching
//!
//! The crawler consults a [`ResponseCache`] before fetching a page and stores
//! successful bodies afterwards. The cache is best effort: a miss only costs a
//! fetch, it never changes which pages a crawl emits.
//!
//! [`MemoryCache`] is the bundled implementation. Persistent or
//! header-aware caches plug in through the same trait.

mod memory;

pub use memory::MemoryCache;

use chrono::{DateTime, Utc};
use std::time::Duration;

/// A cached response body
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Response body
    pub body: Vec<u8>,

    /// Content-Type header value
    pub content_type: String,

    /// HTTP status code
    pub status_code: u16,

    /// When the entry was stored
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time
    pub fn new(body: Vec<u8>, content_type: impl Into<String>, status_code: u16) -> Self {
        Self {
            body,
            content_type: content_type.into(),
            status_code,
            cached_at: Utc::now(),
        }
    }

    /// Returns how long ago the entry was stored
    ///
    /// Clock skew that puts `cached_at` in the future counts as zero age.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.cached_at).to_std().unwrap_or_default()
    }

    /// Checks if the entry is older than `ttl`
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}

/// Get/set-by-key response store shared by all fetch workers
///
/// Keys are normalized URLs. Implementations must be safe to call from many
/// tasks at once.
pub trait ResponseCache: Send + Sync {
    /// Returns the entry for `key` if present and still valid
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Stores a response body under `key`
    fn set(&self, key: &str, body: Vec<u8>, content_type: &str, status_code: u16);
}
