//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Seeding the frontier from a sitemap and/or the start URL
//! - Spawning page workers under the global concurrency limit
//! - Admission of discovered links (scope, filter, depth, dedup)
//! - Emitting accepted pages on the item channel
//! - Cancellation and draining of in-flight work

use crate::config::CrawlScope;
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::parser::parse_html;
use crate::crawler::scheduler::DomainLimiter;
use crate::crawler::session::{CrawlPhase, CrawlSession};
use crate::sitemap::{SitemapError, SitemapResolver};
use crate::source::ContentItem;
use crate::url::dedup_key;
use crate::CrawlError;
use chrono::Utc;
use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A URL admitted for fetching
#[derive(Debug, Clone)]
pub(crate) struct PageTask {
    /// URL to request (first-seen spelling, fragment removed)
    pub url: Url,

    /// Dedup key, also used as the cache key
    pub key: String,

    /// Link hops from the seed
    pub depth: u32,
}

/// Everything a worker needs, shared across the run
pub(crate) struct CrawlContext {
    pub scope: Arc<CrawlScope>,
    pub session: CrawlSession,
    pub fetcher: Fetcher,
    pub limiter: DomainLimiter,
    pub items: mpsc::Sender<ContentItem>,
    pub cancel: CancellationToken,
}

impl CrawlContext {
    /// Decides whether a discovered URL enters the frontier
    ///
    /// The depth check runs before the URL is marked visited, so a URL seen
    /// too deep can still be admitted later through a shorter path.
    fn admit(&self, raw: &str, depth: u32) -> Option<PageTask> {
        self.admit_inner(raw, depth, true)
    }

    /// Admits the start URL, which the include/exclude patterns never reject
    fn admit_seed(&self, raw: &str) -> Option<PageTask> {
        self.admit_inner(raw, 0, false)
    }

    fn admit_inner(&self, raw: &str, depth: u32, apply_filter: bool) -> Option<PageTask> {
        let mut url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Rejecting unparsable URL {}: {}", raw, e);
                return None;
            }
        };

        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }

        if !self.scope.is_in_domain(&url) {
            tracing::trace!("Rejecting out-of-domain URL {}", raw);
            return None;
        }

        if apply_filter && !self.scope.filter.allow(url.path()) {
            tracing::debug!("Rejecting filtered URL {}", raw);
            return None;
        }

        if !self.scope.within_depth(depth) {
            tracing::debug!("Rejecting {} at depth {}", raw, depth);
            return None;
        }

        let key = dedup_key(raw, self.scope.normalize_urls);
        if !self.session.mark_visited(&key) {
            return None;
        }

        url.set_fragment(None);
        tracing::debug!("Admitted {} at depth {}", url, depth);
        Some(PageTask { url, key, depth })
    }

    /// Checks where a fetch actually landed after redirects
    ///
    /// The target must be in scope and must not already be in the visited
    /// set; it is marked visited so a later link to it is not fetched again.
    fn accept_redirect(&self, task: &PageTask, final_url: &Url) -> bool {
        if *final_url == task.url {
            return true;
        }

        if !matches!(final_url.scheme(), "http" | "https")
            || !self.scope.is_in_domain(final_url)
            || !self.scope.filter.allow(final_url.path())
        {
            tracing::warn!(
                "Skipping {}: redirected out of scope to {}",
                task.url,
                final_url
            );
            return false;
        }

        let key = dedup_key(final_url.as_str(), self.scope.normalize_urls);
        if key != task.key && !self.session.mark_visited(&key) {
            tracing::debug!(
                "Skipping {}: redirect target {} already visited",
                task.url,
                final_url
            );
            return false;
        }

        true
    }
}

/// Builds the item emitted for a fetched page
fn build_item(
    task: &PageTask,
    final_url: &str,
    status_code: u16,
    content_type: &str,
    body: Vec<u8>,
    from_cache: bool,
    title: Option<String>,
) -> ContentItem {
    let url = &task.url;
    let mut path = format!("{}{}", url.host_str().unwrap_or_default(), url.path());
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }

    let mut metadata = HashMap::from([
        ("url".to_string(), url.to_string()),
        ("final_url".to_string(), final_url.to_string()),
        ("status_code".to_string(), status_code.to_string()),
        ("depth".to_string(), task.depth.to_string()),
        ("fetched_at".to_string(), Utc::now().to_rfc3339()),
        ("from_cache".to_string(), from_cache.to_string()),
    ]);
    if let Some(title) = title {
        metadata.insert("title".to_string(), title);
    }

    ContentItem {
        path,
        source_url: url.to_string(),
        content: body,
        content_type: content_type.to_string(),
        metadata,
    }
}

/// Fetches one page, emits it if accepted, and returns newly admitted links
async fn process_page(ctx: &CrawlContext, task: PageTask) -> Vec<PageTask> {
    let domain = ctx.scope.domain_of(&task.url);
    let Some(domain_permit) = ctx.limiter.acquire(&domain, &ctx.cancel).await else {
        return Vec::new();
    };

    if ctx.session.limit_reached() {
        return Vec::new();
    }

    let result = match ctx
        .fetcher
        .fetch(task.url.as_str(), &task.key, &ctx.cancel)
        .await
    {
        Ok(result) => result,
        Err(FetchError::Cancelled) => return Vec::new(),
        Err(e) => {
            tracing::warn!("Skipping {}: {}", task.url, e);
            return Vec::new();
        }
    };
    drop(domain_permit);

    let final_url = Url::parse(&result.final_url).unwrap_or_else(|_| task.url.clone());
    if !ctx.accept_redirect(&task, &final_url) {
        return Vec::new();
    }

    if !result.is_success() {
        tracing::warn!("Skipping {}: HTTP {}", task.url, result.status_code);
        return Vec::new();
    }

    if !result.is_html() {
        tracing::debug!(
            "Skipping {}: content type {:?} is not HTML",
            task.url,
            result.content_type
        );
        return Vec::new();
    }

    if !ctx.session.try_accept_page() {
        tracing::debug!("Page cap reached, dropping {}", task.url);
        return Vec::new();
    }

    let parsed = parse_html(&String::from_utf8_lossy(&result.body), &final_url);

    let item = build_item(
        &task,
        &result.final_url,
        result.status_code,
        &result.content_type,
        result.body,
        result.from_cache,
        parsed.title,
    );

    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Vec::new(),
        sent = ctx.items.send(item) => {
            if sent.is_err() {
                tracing::debug!("Item receiver dropped, stopping crawl");
                ctx.cancel.cancel();
                return Vec::new();
            }
        }
    }

    tracing::info!(
        "Emitted {} (depth {}, {} of {})",
        task.url,
        task.depth,
        ctx.session.accepted_pages(),
        ctx.scope.max_pages
    );

    if !ctx.scope.follows_links() || ctx.session.limit_reached() {
        return Vec::new();
    }

    parsed
        .links
        .iter()
        .filter_map(|link| ctx.admit(link, task.depth + 1))
        .collect()
}

/// Main crawler coordinator structure
pub struct Coordinator {
    ctx: Arc<CrawlContext>,
    resolver: SitemapResolver,
    frontier: VecDeque<PageTask>,
    global_semaphore: Arc<Semaphore>,
    tasks: JoinSet<Vec<PageTask>>,
}

impl Coordinator {
    pub(crate) fn new(
        scope: Arc<CrawlScope>,
        fetcher: Fetcher,
        resolver: SitemapResolver,
        items: mpsc::Sender<ContentItem>,
        cancel: CancellationToken,
    ) -> Self {
        let ctx = CrawlContext {
            session: CrawlSession::new(scope.max_pages),
            limiter: DomainLimiter::new(scope.concurrency, scope.request_delay),
            scope: scope.clone(),
            fetcher,
            items,
            cancel,
        };

        Self {
            global_semaphore: Arc::new(Semaphore::new(scope.concurrency.max(1))),
            ctx: Arc::new(ctx),
            resolver,
            frontier: VecDeque::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Runs the crawl to completion or cancellation
    ///
    /// The item sender is dropped when this returns, which closes the item
    /// channel once every worker has finished.
    pub async fn run(mut self) -> Result<(), CrawlError> {
        let scope = self.ctx.scope.clone();
        tracing::info!("Starting crawl of {}", scope.start_url);

        let outcome = match self.seed(&scope).await {
            Ok(()) => self.drive().await,
            Err(e) => Err(e),
        };
        let session = &self.ctx.session;

        match &outcome {
            Ok(()) => {
                session.transition(CrawlPhase::Draining);
                session.transition(CrawlPhase::Done);
            }
            Err(_) => session.transition(CrawlPhase::Cancelled),
        }

        tracing::info!(
            "Crawl finished: {} pages emitted, {} URLs seen in {:?}",
            session.accepted_pages(),
            session.visited_count(),
            session.elapsed()
        );

        outcome
    }

    /// Fills the frontier from the sitemap and then the start URL
    async fn seed(&mut self, scope: &CrawlScope) -> Result<(), CrawlError> {
        if scope.sitemap_enabled {
            self.seed_from_sitemap().await?;
        }

        if scope.follows_links() {
            self.ctx.session.transition(CrawlPhase::LinkFollowPhase);
            if let Some(task) = self.ctx.admit_seed(scope.start_url.as_str()) {
                self.frontier.push_back(task);
            }
        }

        Ok(())
    }

    /// Resolves the sitemap and queues its URLs at depth 0
    async fn seed_from_sitemap(&mut self) -> Result<(), CrawlError> {
        let scope = self.ctx.scope.clone();
        self.ctx.session.transition(CrawlPhase::SitemapPhase);

        let urls = match self
            .resolver
            .fetch_urls(scope.sitemap_url.as_str(), &self.ctx.cancel)
            .await
        {
            Ok(urls) => urls,
            Err(SitemapError::Cancelled) => return Err(CrawlError::Cancelled),
            Err(e) => {
                if scope.follows_links() {
                    tracing::warn!("{}; falling back to link following", e);
                } else {
                    tracing::warn!("{}; nothing to crawl in sitemap-only mode", e);
                }
                return Ok(());
            }
        };

        tracing::info!("Sitemap listed {} URLs", urls.len());

        for url in urls {
            if self.ctx.cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }
            if self.ctx.session.limit_reached() {
                break;
            }
            if let Some(task) = self.ctx.admit(&url, 0) {
                self.frontier.push_back(task);
            }
        }

        Ok(())
    }

    /// Schedules frontier URLs and collects worker results until done
    async fn drive(&mut self) -> Result<(), CrawlError> {
        loop {
            if self.ctx.cancel.is_cancelled() {
                return self.drain_cancelled().await;
            }

            if self.ctx.session.limit_reached() {
                if !self.frontier.is_empty() {
                    tracing::debug!(
                        "Page cap reached, discarding {} queued URLs",
                        self.frontier.len()
                    );
                    self.frontier.clear();
                }
                self.ctx.session.transition(CrawlPhase::Draining);
            } else {
                self.spawn_ready();
            }

            if self.tasks.is_empty() {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => return self.drain_cancelled().await,
                joined = self.tasks.join_next() => match joined {
                    Some(Ok(discovered)) => self.frontier.extend(discovered),
                    Some(Err(e)) => tracing::warn!("Page worker failed: {}", e),
                    None => {}
                },
            }
        }
    }

    /// Spawns workers while global permits and frontier URLs are available
    fn spawn_ready(&mut self) {
        while !self.frontier.is_empty() {
            let Ok(permit) = self.global_semaphore.clone().try_acquire_owned() else {
                break;
            };
            let Some(task) = self.frontier.pop_front() else {
                break;
            };

            let ctx = self.ctx.clone();
            self.tasks.spawn(async move {
                let _permit = permit;
                let url = task.url.clone();
                match AssertUnwindSafe(process_page(&ctx, task)).catch_unwind().await {
                    Ok(discovered) => discovered,
                    Err(_) => {
                        tracing::warn!("Worker for {} panicked, skipping page", url);
                        Vec::new()
                    }
                }
            });
        }
    }

    /// Waits for in-flight workers to unwind after cancellation
    async fn drain_cancelled(&mut self) -> Result<(), CrawlError> {
        self.ctx.session.transition(CrawlPhase::Cancelled);
        self.frontier.clear();

        tracing::info!("Crawl cancelled, waiting for {} workers", self.tasks.len());
        while self.tasks.join_next().await.is_some() {}

        Err(CrawlError::Cancelled)
    }
}
