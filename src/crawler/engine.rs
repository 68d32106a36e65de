use crate::cache::{MemoryCache, ResponseCache};
use crate::config::{Config, CrawlScope};
use crate::crawler::coordinator::Coordinator;
use crate::crawler::fetcher::Fetcher;
use crate::sitemap::SitemapResolver;
use crate::source::{ContentItem, ContentSource};
use crate::transport::{build_http_client, HttpTransport, RetryTransport, Transport};
use crate::CrawlError;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The web traversal engine
///
/// Construction validates the configuration and freezes it into a
/// [`CrawlScope`]. Each call to [`traverse`](ContentSource::traverse) starts
/// an independent run with its own visited set and page counter; the
/// response cache is shared between runs.
#[derive(Clone)]
pub struct WebCrawler {
    scope: Arc<CrawlScope>,
    client: Client,
    transport: Arc<dyn Transport>,
    cache: Option<Arc<dyn ResponseCache>>,
}

impl WebCrawler {
    /// Creates a crawler from a configuration
    ///
    /// # Returns
    ///
    /// * `Ok(WebCrawler)` - Configuration is valid and the HTTP client was built
    /// * `Err(CrawlError)` - Invalid configuration or client setup failure
    pub fn new(config: Config) -> Result<Self, CrawlError> {
        let scope = CrawlScope::from_config(&config)?;
        let client = build_http_client(&scope.user_agent)?;

        let transport: Arc<dyn Transport> = Arc::new(RetryTransport::new(
            HttpTransport::new(client.clone()),
            scope.backoff,
        ));

        let cache = scope.cache_enabled.then(|| {
            Arc::new(MemoryCache::new(scope.cache_ttl, scope.cache_max_items))
                as Arc<dyn ResponseCache>
        });

        tracing::debug!(
            "Crawler scope: domains={:?} max_depth={} max_pages={} concurrency={}",
            scope.allowed_domains,
            scope.max_depth,
            scope.max_pages,
            scope.concurrency
        );

        Ok(Self {
            scope: Arc::new(scope),
            client,
            transport,
            cache,
        })
    }

    /// Replaces the response cache
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the network transport
    ///
    /// The given transport is the leaf; it is still wrapped in the configured
    /// retry policy.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Arc::new(RetryTransport::new(transport, self.scope.backoff));
        self
    }

    pub fn scope(&self) -> &CrawlScope {
        &self.scope
    }

    fn coordinator(
        &self,
        items: mpsc::Sender<ContentItem>,
        cancel: CancellationToken,
    ) -> Coordinator {
        let fetcher = Fetcher::new(
            self.client.clone(),
            self.transport.clone(),
            self.cache.clone(),
            self.scope.user_agent.clone(),
        );

        let resolver = SitemapResolver::new(
            self.client.clone(),
            self.transport.clone(),
            self.scope.user_agent.clone(),
            self.scope.filter.clone(),
        );

        Coordinator::new(self.scope.clone(), fetcher, resolver, items, cancel)
    }
}

impl ContentSource for WebCrawler {
    /// Starts a crawl on the current Tokio runtime
    ///
    /// Items arrive on the first receiver as they are accepted. When the run
    /// ends the item channel closes first; a cancelled run then delivers one
    /// [`CrawlError::Cancelled`] on the error channel before it closes.
    fn traverse(
        &self,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<ContentItem>, mpsc::Receiver<CrawlError>) {
        let (item_tx, item_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::channel(1);

        let coordinator = self.coordinator(item_tx, cancel.child_token());

        tokio::spawn(async move {
            if let Err(e) = coordinator.run().await {
                // The receiver may already be gone; nothing else to notify
                let _ = err_tx.send(e).await;
            }
        });

        (item_rx, err_rx)
    }
}
