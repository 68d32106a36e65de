use crate::cache::{CacheEntry, ResponseCache};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Stored entry plus its insertion sequence number
#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    next_seq: u64,
}

/// Bounded, TTL-based in-memory response cache
///
/// Reads take a shared lock, writes an exclusive one. Expired entries are
/// invisible to [`get`](ResponseCache::get) but stay stored until a
/// [`set`](ResponseCache::set) at capacity evicts them; eviction always removes
/// the single entry with the oldest `cached_at`.
#[derive(Debug)]
pub struct MemoryCache {
    inner: RwLock<Inner>,
    ttl: Duration,
    max_items: usize,
}

impl MemoryCache {
    /// Creates a cache holding at most `max_items` entries for `ttl` each
    pub fn new(ttl: Duration, max_items: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ttl,
            max_items: max_items.max(1),
        }
    }

    /// Returns the number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry
    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .clear();
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let slot = inner.slots.get(key)?;

        if slot.entry.is_expired(self.ttl) {
            return None;
        }

        Some(slot.entry.clone())
    }

    fn set(&self, key: &str, body: Vec<u8>, content_type: &str, status_code: u16) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if !inner.slots.contains_key(key) && inner.slots.len() >= self.max_items {
            let oldest = inner
                .slots
                .iter()
                .min_by_key(|(_, slot)| (slot.entry.cached_at, slot.seq))
                .map(|(k, _)| k.clone());

            if let Some(oldest) = oldest {
                tracing::trace!("Evicting cached response for {}", oldest);
                inner.slots.remove(&oldest);
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.slots.insert(
            key.to_string(),
            Slot {
                entry: CacheEntry::new(body, content_type, status_code),
                seq,
            },
        );
    }
}
