use crate::common::{html, page_with_links, paths, run, run_to_end, test_config};
use async_trait::async_trait;
use reqwest::{Request, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use weft_crawl::cache::{MemoryCache, ResponseCache};
use weft_crawl::transport::{Transport, TransportError};
use weft_crawl::{crawl, normalize_url, CrawlError, WebCrawler};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/docs/a", "/docs/b"]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/a"))
        .respond_with(page_with_links("A", &["/docs/b", "/"]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/b"))
        .respond_with(page_with_links("B", &[]))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = WebCrawler::new(test_config(&server, "/")).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/", "/docs/a", "/docs/b"]);

    let b = items
        .iter()
        .find(|item| item.source_url.ends_with("/docs/b"))
        .unwrap();
    assert_eq!(b.meta("title"), Some("B"));
    assert_eq!(b.meta("depth"), Some("1"));
    assert_eq!(b.meta("status_code"), Some("200"));
    assert_eq!(b.content_type, "text/html");
    assert!(b.path.ends_with("/docs/b"));
    assert!(b.text().contains("<title>B</title>"));
}

#[tokio::test]
async fn test_spelling_variants_fetched_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links(
            "Home",
            &["/docs/a", "/docs/a/", "/docs/a#section", "/DOCS/../docs/a"],
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/a"))
        .respond_with(page_with_links("A", &["/docs/a/#top"]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/a/"))
        .respond_with(page_with_links("A slash", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = WebCrawler::new(test_config(&server, "/")).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/", "/docs/a"]);
}

#[tokio::test]
async fn test_max_pages_stops_scheduling() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/p1", "/p2", "/p3", "/p4", "/p5"]))
        .expect(1)
        .mount(&server)
        .await;

    for p in ["/p1", "/p2", "/p3", "/p4", "/p5"] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(page_with_links(p, &[]))
            .expect(0)
            .mount(&server)
            .await;
    }

    let mut config = test_config(&server, "/");
    config.crawl.max_pages = 1;

    let crawler = WebCrawler::new(config).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_max_pages_is_never_exceeded() {
    let server = MockServer::start().await;

    let links: Vec<String> = (0..20).map(|i| format!("/p{i}")).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &link_refs))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(page_with_links("Leaf", &[]))
        .mount(&server)
        .await;

    let mut config = test_config(&server, "/");
    config.crawl.max_pages = 5;
    config.crawl.concurrency = 8;

    let crawler = WebCrawler::new(config).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(items.len(), 5);
}

#[tokio::test]
async fn test_excluded_assets_are_not_fetched() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links(
            "Home",
            &["/style.css", "/app.js", "/api/users", "/docs/page"],
        ))
        .mount(&server)
        .await;

    for p in ["/style.css", "/app.js", "/api/users"] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(html("nope"))
            .expect(0)
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/docs/page"))
        .respond_with(page_with_links("Page", &[]))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = WebCrawler::new(test_config(&server, "/")).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/", "/docs/page"]);
}

#[tokio::test]
async fn test_include_patterns_restrict_links() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/docs"))
        .respond_with(page_with_links("Docs", &["/docs/guide", "/blog/post"]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/guide"))
        .respond_with(page_with_links("Guide", &[]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/blog/post"))
        .respond_with(page_with_links("Post", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server, "/docs");
    config.crawl.include_patterns = vec!["/docs".to_string(), "/docs/**".to_string()];

    let crawler = WebCrawler::new(config).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/docs", "/docs/guide"]);
}

#[tokio::test]
async fn test_start_url_is_crawled_outside_include_patterns() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/docs/a", "/blog/x"]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/a"))
        .respond_with(page_with_links("A", &["/blog/x"]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/blog/x"))
        .respond_with(page_with_links("X", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server, "/");
    config.crawl.include_patterns = vec!["/docs/**".to_string()];

    let crawler = WebCrawler::new(config).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/", "/docs/a"]);
}

#[tokio::test]
async fn test_depth_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/level1"]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/level1"))
        .respond_with(page_with_links("L1", &["/level2"]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/level2"))
        .respond_with(page_with_links("L2", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server, "/");
    config.crawl.max_depth = 1;

    let crawler = WebCrawler::new(config).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/", "/level1"]);
}

#[tokio::test]
async fn test_non_html_is_fetched_but_not_emitted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/report"]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"<a href="/hidden">x</a>"#, "text/plain"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/hidden"))
        .respond_with(page_with_links("Hidden", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = WebCrawler::new(test_config(&server, "/")).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/"]);
}

#[tokio::test]
async fn test_failed_pages_are_skipped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/missing", "/ok"]))
        .mount(&server)
        .await;

    // 404 is permanent and must not be retried
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(page_with_links("OK", &[]))
        .mount(&server)
        .await;

    let crawler = WebCrawler::new(test_config(&server, "/")).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/", "/ok"]);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &[]))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = WebCrawler::new(test_config(&server, "/")).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_links_resolve_against_redirect_target() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", "/guide/start"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/guide/start"))
        .respond_with(page_with_links("Start", &["next"]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/guide/next"))
        .respond_with(page_with_links("Next", &[]))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = WebCrawler::new(test_config(&server, "/")).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/", "/guide/next"]);

    let root = items
        .iter()
        .find(|item| item.meta("depth") == Some("0"))
        .unwrap();
    assert!(root.meta("final_url").unwrap().ends_with("/guide/start"));
}

#[tokio::test]
async fn test_redirect_off_domain_is_not_emitted() {
    let server = MockServer::start().await;
    let elsewhere = MockServer::start().await;
    let elsewhere_port = url::Url::parse(&elsewhere.uri()).unwrap().port().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/go"]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(ResponseTemplate::new(302).insert_header(
            "location",
            format!("http://localhost:{elsewhere_port}/offsite").as_str(),
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/offsite"))
        .respond_with(page_with_links("OFFSITE", &["/more"]))
        .mount(&elsewhere)
        .await;

    Mock::given(method("GET"))
        .and(path("/more"))
        .respond_with(page_with_links("More", &[]))
        .expect(0)
        .mount(&elsewhere)
        .await;

    // Allowed domains default to the start host, 127.0.0.1
    let crawler = WebCrawler::new(test_config(&server, "/")).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/"]);
    assert!(items.iter().all(|item| item.meta("title") != Some("OFFSITE")));
}

#[tokio::test]
async fn test_redirect_target_is_fetched_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/a"]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/b"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(page_with_links("B", &["/b", "/"]))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = WebCrawler::new(test_config(&server, "/")).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/", "/a"]);

    let redirected = items
        .iter()
        .find(|item| item.source_url.ends_with("/a"))
        .unwrap();
    assert!(redirected.meta("final_url").unwrap().ends_with("/b"));
}

#[tokio::test]
async fn test_cancellation_mid_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Slow", &[]).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let crawler = WebCrawler::new(test_config(&server, "/")).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let (items, error) = tokio::time::timeout(Duration::from_secs(5), run(&crawler, cancel))
        .await
        .expect("cancelled crawl did not stop");

    assert!(items.is_empty());
    assert!(matches!(error, Some(CrawlError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(page_with_links("Home", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = WebCrawler::new(test_config(&server, "/")).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let (items, error) = run(&crawler, cancel).await;

    assert!(items.is_empty());
    assert!(matches!(error, Some(CrawlError::Cancelled)));
}

#[tokio::test]
async fn test_cancellation_during_sitemap_phase() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server, "/");
    config.sitemap.enabled = true;
    let crawler = WebCrawler::new(config).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let (items, error) = tokio::time::timeout(Duration::from_secs(5), run(&crawler, cancel))
        .await
        .unwrap();

    assert!(items.is_empty());
    assert!(matches!(error, Some(CrawlError::Cancelled)));
}

#[tokio::test]
async fn test_sitemap_only_mode() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?>
                <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                  <url><loc>{base}/docs/a</loc></url>
                  <url><loc>{base}/docs/b</loc></url>
                  <url><loc>{base}/docs/a</loc></url>
                </urlset>"#
            ),
            "application/xml",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/a"))
        .respond_with(page_with_links("A", &["/docs/c"]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/b"))
        .respond_with(page_with_links("B", &[]))
        .expect(1)
        .mount(&server)
        .await;

    // Neither the start URL nor in-page links are crawled
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &[]))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/c"))
        .respond_with(page_with_links("C", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server, "/");
    config.sitemap.only = true;

    let crawler = WebCrawler::new(config).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/docs/a", "/docs/b"]);
    assert!(items.iter().all(|item| item.meta("depth") == Some("0")));
}

#[tokio::test]
async fn test_sitemap_failure_falls_back_to_links() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/about"]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(page_with_links("About", &[]))
        .mount(&server)
        .await;

    let mut config = test_config(&server, "/");
    config.sitemap.enabled = true;

    let crawler = WebCrawler::new(config).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/", "/about"]);
}

#[tokio::test]
async fn test_sitemap_only_failure_yields_empty_crawl() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(html("<html>not a sitemap</html>"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(&server, "/");
    config.sitemap.only = true;

    let crawler = WebCrawler::new(config).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_sitemap_and_links_combined() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!(r#"<urlset><url><loc>{base}/</loc></url><url><loc>{base}/from-sitemap</loc></url></urlset>"#),
            "application/xml",
        ))
        .mount(&server)
        .await;

    // Listed by the sitemap and seeded as the start URL; fetched once
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/from-link"]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/from-sitemap"))
        .respond_with(page_with_links("S", &[]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/from-link"))
        .respond_with(page_with_links("L", &[]))
        .mount(&server)
        .await;

    let mut config = test_config(&server, "/");
    config.sitemap.enabled = true;

    let crawler = WebCrawler::new(config).unwrap();
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(paths(&items), vec!["/", "/from-link", "/from-sitemap"]);
}

#[tokio::test]
async fn test_injected_cache_serves_pages() {
    let server = MockServer::start().await;
    let start = format!("{}/", server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Network", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryCache::new(Duration::from_secs(60), 10));
    cache.set(
        &normalize_url(&start).unwrap(),
        b"<html><head><title>Cached</title></head></html>".to_vec(),
        "text/html",
        200,
    );

    let crawler = WebCrawler::new(test_config(&server, "/"))
        .unwrap()
        .with_cache(cache);
    let (items, error) = run_to_end(&crawler).await;

    assert!(error.is_none());
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].meta("title"), Some("Cached"));
    assert_eq!(items[0].meta("from_cache"), Some("true"));
}

#[tokio::test]
async fn test_cache_is_shared_between_runs() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &[]))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = WebCrawler::new(test_config(&server, "/")).unwrap();

    let (first, _) = run_to_end(&crawler).await;
    let (second, _) = run_to_end(&crawler).await;

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].meta("from_cache"), Some("false"));
    assert_eq!(second[0].meta("from_cache"), Some("true"));
}

/// Leaf transport that panics on every request
struct PanickingTransport;

#[async_trait]
impl Transport for PanickingTransport {
    async fn round_trip(
        &self,
        _request: Request,
        _cancel: &CancellationToken,
    ) -> Result<Response, TransportError> {
        panic!("transport exploded");
    }
}

#[tokio::test]
async fn test_worker_panic_is_a_page_failure() {
    let server = MockServer::start().await;

    let crawler = WebCrawler::new(test_config(&server, "/"))
        .unwrap()
        .with_transport(Arc::new(PanickingTransport));
    let (items, error) = run_to_end(&crawler).await;

    assert!(items.is_empty());
    assert!(error.is_none());
}

#[tokio::test]
async fn test_crawl_convenience_function() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page_with_links("Home", &["/next"]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(page_with_links("Next", &[]))
        .mount(&server)
        .await;

    let items = crawl(test_config(&server, "/"), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(paths(&items), vec!["/", "/next"]);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let server = MockServer::start().await;
    let mut config = test_config(&server, "/");
    config.crawl.concurrency = 0;

    assert!(matches!(
        WebCrawler::new(config),
        Err(CrawlError::Config(_))
    ));
}
