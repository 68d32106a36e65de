//! Weft-Crawl main entry point
//!
//! This is the command-line interface for the Weft-Crawl web traversal engine.

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use weft_crawl::config::{load_config_with_hash, Config};
use weft_crawl::{ContentItem, ContentSource, CrawlError, CrawlScope, WebCrawler};

/// Weft-Crawl: web traversal for content ingestion
///
/// Crawls a site from a start URL and/or its sitemap, staying inside the
/// configured domains and path patterns, and streams every HTML page it
/// accepts as a JSON line.
#[derive(Parser, Debug)]
#[command(name = "weft-crawl")]
#[command(version)]
#[command(about = "Web traversal engine for content ingestion", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the resolved crawl scope without crawling
    #[arg(long)]
    dry_run: bool,

    /// Write page bodies and an items.jsonl manifest into this directory
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,
}

/// One emitted page as written to stdout or the manifest
#[derive(Debug, Serialize)]
struct ItemRecord<'a> {
    path: &'a str,
    source_url: &'a str,
    content_type: &'a str,
    metadata: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    handle_crawl(config, cli.output.as_deref()).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so stdout carries only JSON lines.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("weft_crawl=info,warn"),
            1 => EnvFilter::new("weft_crawl=debug,info"),
            2 => EnvFilter::new("weft_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and prints the resolved scope
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let scope = CrawlScope::from_config(config)?;

    println!("=== Weft-Crawl Dry Run ===\n");

    println!("Start URL: {}", scope.start_url);
    println!("Allowed domains: {}", scope.allowed_domains.join(", "));
    println!(
        "Include patterns: {}",
        display_list(&config.crawl.include_patterns)
    );
    println!(
        "Exclude patterns: {}",
        display_list(&config.crawl.exclude_patterns)
    );

    println!("\nLimits:");
    println!("  Max depth: {}", display_limit(scope.max_depth as usize));
    println!("  Max pages: {}", display_limit(scope.max_pages));
    println!("  Concurrency per domain: {}", scope.concurrency);
    println!("  Request delay: {:?}", scope.request_delay);
    println!("  User agent: {}", scope.user_agent);
    println!("  Normalize URLs: {}", scope.normalize_urls);

    println!("\nSitemap:");
    if scope.sitemap_enabled {
        println!("  URL: {}", scope.sitemap_url);
        println!("  Sitemap only: {}", scope.sitemap_only);
    } else {
        println!("  Disabled");
    }

    println!("\nRetry:");
    println!("  Max retries: {}", scope.backoff.max_retries);
    println!(
        "  Backoff: {:?} doubling up to {:?}",
        scope.backoff.base_delay, scope.backoff.max_delay
    );

    println!("\nCache:");
    if scope.cache_enabled {
        println!("  TTL: {:?}", scope.cache_ttl);
        println!("  Max items: {}", scope.cache_max_items);
    } else {
        println!("  Disabled");
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn display_limit(limit: usize) -> String {
    if limit == 0 {
        "unlimited".to_string()
    } else {
        limit.to_string()
    }
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, output: Option<&Path>) -> anyhow::Result<()> {
    let crawler = WebCrawler::new(config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping crawl");
            on_signal.cancel();
        }
    });

    let mut manifest = match output {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            let path = dir.join("items.jsonl");
            Some(
                std::fs::File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?,
            )
        }
        None => None,
    };

    let (mut items, mut errors) = crawler.traverse(cancel);
    let stdout = std::io::stdout();
    let mut emitted = 0usize;

    while let Some(item) = items.recv().await {
        emitted += 1;
        match (output, manifest.as_mut()) {
            (Some(dir), Some(file)) => {
                let name = write_body(dir, emitted, &item)?;
                writeln!(file, "{}", serde_json::to_string(&record(&item, Some(name), false))?)?;
            }
            _ => {
                let mut out = stdout.lock();
                writeln!(out, "{}", serde_json::to_string(&record(&item, None, true))?)?;
            }
        }
    }

    match errors.recv().await {
        Some(CrawlError::Cancelled) => {
            tracing::warn!("Crawl cancelled after {} pages", emitted);
            Ok(())
        }
        Some(e) => Err(e.into()),
        None => {
            tracing::info!("Crawl completed: {} pages", emitted);
            Ok(())
        }
    }
}

fn record(item: &ContentItem, file: Option<String>, with_content: bool) -> ItemRecord<'_> {
    ItemRecord {
        path: &item.path,
        source_url: &item.source_url,
        content_type: &item.content_type,
        metadata: &item.metadata,
        file,
        content: with_content.then(|| item.text()),
    }
}

/// Writes a page body under `dir` and returns the file name
fn write_body(dir: &Path, seq: usize, item: &ContentItem) -> anyhow::Result<String> {
    let slug: String = item
        .path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .take(120)
        .collect();
    let name = format!("{seq:05}-{slug}.html");

    let path = dir.join(&name);
    std::fs::write(&path, &item.content)
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(name)
}
