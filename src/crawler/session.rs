//! Per-run crawl state shared by the coordinator and its workers

use dashmap::DashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Lifecycle of a single crawl run
///
/// `Idle -> SitemapPhase? -> LinkFollowPhase? -> Draining -> Done`, with
/// `Cancelled` reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    SitemapPhase,
    LinkFollowPhase,
    Draining,
    Done,
    Cancelled,
}

impl CrawlPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::SitemapPhase => "sitemap",
            Self::LinkFollowPhase => "link-follow",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// State scoped to one crawl run
///
/// The visited set only grows. The accepted-page counter never exceeds
/// `max_pages` (0 means unlimited).
#[derive(Debug)]
pub struct CrawlSession {
    visited: DashSet<String>,
    accepted: AtomicUsize,
    max_pages: usize,
    phase: Mutex<CrawlPhase>,
    started_at: Instant,
}

impl CrawlSession {
    pub fn new(max_pages: usize) -> Self {
        Self {
            visited: DashSet::new(),
            accepted: AtomicUsize::new(0),
            max_pages,
            phase: Mutex::new(CrawlPhase::Idle),
            started_at: Instant::now(),
        }
    }

    /// Marks a dedup key as visited
    ///
    /// Returns true if the key was not seen before in this run.
    pub fn mark_visited(&self, key: &str) -> bool {
        self.visited.insert(key.to_string())
    }

    pub fn is_visited(&self, key: &str) -> bool {
        self.visited.contains(key)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Reserves a slot for one more emitted page
    ///
    /// Returns false once the page cap has been reached.
    pub fn try_accept_page(&self) -> bool {
        if self.max_pages == 0 {
            self.accepted.fetch_add(1, Ordering::SeqCst);
            return true;
        }

        self.accepted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_pages).then_some(n + 1)
            })
            .is_ok()
    }

    pub fn accepted_pages(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Returns true once no further page may be accepted
    pub fn limit_reached(&self) -> bool {
        self.max_pages != 0 && self.accepted_pages() >= self.max_pages
    }

    pub fn phase(&self) -> CrawlPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Moves to `next` unless the run already ended
    pub fn transition(&self, next: CrawlPhase) {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        if phase.is_terminal() || *phase == next {
            return;
        }

        tracing::info!("Crawl phase: {} -> {}", *phase, next);
        *phase = next;
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
