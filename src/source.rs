//! The pipeline-facing content interface
//!
//! Every traversal engine in the ingestion pipeline yields [`ContentItem`]s
//! through a [`ContentSource`]. The web crawler is one such source.

use crate::CrawlError;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A single unit of fetched content
#[derive(Debug, Clone, Serialize)]
pub struct ContentItem {
    /// Source-relative identifier (`host/path`, plus `?query` when present)
    pub path: String,

    /// Where the content came from
    pub source_url: String,

    /// Raw content bytes
    #[serde(skip)]
    pub content: Vec<u8>,

    /// Content-Type header value
    pub content_type: String,

    /// Fetch details (`url`, `final_url`, `status_code`, `depth`, ...)
    pub metadata: HashMap<String, String>,
}

impl ContentItem {
    /// Returns the content as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    /// Looks up a metadata value
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// A producer of [`ContentItem`]s
///
/// `traverse` starts the traversal in the background and returns two
/// receivers. The producer closes the item channel first and the error
/// channel last; at most one terminating error is sent.
pub trait ContentSource {
    fn traverse(
        &self,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<ContentItem>, mpsc::Receiver<CrawlError>);
}
