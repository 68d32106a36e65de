//! Parse sitemap.xml urlsets and sitemap index files.

use quick_xml::events::Event;
use quick_xml::Reader;

/// An entry from a urlset or a sitemap index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    pub priority: Option<f32>,
}

/// Which sitemap document a parse expects at the root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    /// `<sitemapindex>` with `<sitemap>` children
    Index,
    /// `<urlset>` with `<url>` children
    UrlSet,
}

impl DocumentKind {
    fn root(self) -> &'static str {
        match self {
            Self::Index => "sitemapindex",
            Self::UrlSet => "urlset",
        }
    }

    fn item(self) -> &'static str {
        match self {
            Self::Index => "sitemap",
            Self::UrlSet => "url",
        }
    }
}

/// Parses a `<sitemapindex>` document
///
/// Returns an error if the XML is malformed or the root element is not
/// `sitemapindex`.
pub fn parse_sitemap_index(xml: &str) -> Result<Vec<SitemapEntry>, String> {
    parse_document(xml, DocumentKind::Index)
}

/// Parses a `<urlset>` document
///
/// Returns an error if the XML is malformed or the root element is not `urlset`.
pub fn parse_urlset(xml: &str) -> Result<Vec<SitemapEntry>, String> {
    parse_document(xml, DocumentKind::UrlSet)
}

fn parse_document(xml: &str, kind: DocumentKind) -> Result<Vec<SitemapEntry>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();

    let mut seen_root = false;
    let mut depth = 0usize;
    let mut current: Option<SitemapEntry> = None;
    let mut current_tag = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                depth += 1;
                match depth {
                    1 => {
                        if name != kind.root() {
                            return Err(format!("expected <{}>, found <{}>", kind.root(), name));
                        }
                        seen_root = true;
                    }
                    2 if name == kind.item() => current = Some(SitemapEntry::default()),
                    // Only direct children of an entry are fields; extension
                    // elements such as <image:loc> sit deeper and are ignored
                    3 => current_tag = name,
                    _ => current_tag.clear(),
                }
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    if name != kind.root() {
                        return Err(format!("expected <{}>, found <{}>", kind.root(), name));
                    }
                    seen_root = true;
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if depth == 2 && name == kind.item() {
                    if let Some(entry) = current.take() {
                        if !entry.loc.is_empty() {
                            entries.push(entry);
                        }
                    }
                }
                current_tag.clear();
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(e)) if depth == 3 => {
                let text = e
                    .unescape()
                    .map_err(|err| format!("invalid text: {err}"))?
                    .trim()
                    .to_string();
                apply_field(current.as_mut(), &current_tag, text);
            }
            Ok(Event::CData(e)) if depth == 3 => {
                let text = String::from_utf8_lossy(&e.into_inner()).trim().to_string();
                apply_field(current.as_mut(), &current_tag, text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML parse error at position {}: {e}",
                    reader.buffer_position()
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(format!("missing <{}> root element", kind.root()));
    }

    Ok(entries)
}

/// Stores text into the field named by the enclosing tag
fn apply_field(entry: Option<&mut SitemapEntry>, tag: &str, text: String) {
    let Some(entry) = entry else {
        return;
    };
    if text.is_empty() {
        return;
    }

    match tag {
        "loc" => entry.loc = text,
        "lastmod" => entry.lastmod = Some(text),
        "changefreq" => entry.changefreq = Some(text),
        "priority" => entry.priority = text.parse::<f32>().ok(),
        _ => {}
    }
}
