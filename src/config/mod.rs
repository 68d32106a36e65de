//! Configuration module for Weft-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and freezing a validated configuration into a [`CrawlScope`].
//!
//! # Example
//!
//! ```no_run
//! use weft_crawl::config::{load_config, CrawlScope};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! let scope = CrawlScope::from_config(&config).unwrap();
//! println!("Crawler will use max depth: {}", scope.max_depth);
//! ```

mod parser;
mod scope;
mod types;
mod validation;

// Re-export types
pub use scope::CrawlScope;
pub use types::{CacheConfig, Config, CrawlConfig, RetryConfig, SitemapConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
