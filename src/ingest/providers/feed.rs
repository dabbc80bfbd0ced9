// src/ingest/providers/feed.rs
//! RSS 2.0 / Atom feed adapter.
//!
//! Parses with `quick-xml` serde. Entries without a title or link are skipped;
//! a document that is not XML at all is an error for the whole source.

use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::types::{RawItem, SourceAdapter, SourceType};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<TextNode>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date")]
    dc_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "category", default)]
    category: Vec<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<TextNode>,
    id: Option<String>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Format-independent view of one feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: Option<String>,
    pub title: String,
    pub link: String,
    pub published: Option<String>,
    pub summary: String,
    pub categories: Vec<String>,
}

/// Parse an RSS 2.0 or Atom document into entries (document order).
pub fn parse_feed_document(s: &str) -> Result<Vec<FeedEntry>> {
    let xml_clean = scrub_html_entities_for_xml(s);
    if looks_like_atom(&xml_clean) {
        let feed: AtomFeed = from_str(&xml_clean).context("parsing atom xml")?;
        Ok(feed.entry.into_iter().filter_map(atom_entry).collect())
    } else {
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;
        Ok(rss.channel.item.into_iter().filter_map(rss_entry).collect())
    }
}

fn looks_like_atom(s: &str) -> bool {
    match (s.find("<feed"), s.find("<rss")) {
        (Some(_), None) => true,
        (Some(f), Some(r)) => f < r,
        _ => false,
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn rss_entry(it: RssItem) -> Option<FeedEntry> {
    let title = non_blank(it.title)?;
    let guid = non_blank(it.guid.map(|g| g.value));
    let guid_link = guid.clone().filter(|g| g.starts_with("http"));
    let link = non_blank(it.link).or(guid_link)?;
    Some(FeedEntry {
        id: guid,
        title,
        link,
        published: non_blank(it.pub_date).or_else(|| non_blank(it.dc_date)),
        summary: it.description.unwrap_or_default(),
        categories: it
            .category
            .into_iter()
            .map(|c| c.value.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
    })
}

fn atom_entry(e: AtomEntry) -> Option<FeedEntry> {
    let title = non_blank(e.title.map(|t| t.value))?;
    let alternate = e
        .link
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| e.link.first())
        .and_then(|l| l.href.clone());
    let id = non_blank(e.id);
    let id_link = id.clone().filter(|id| id.starts_with("http"));
    let link = non_blank(alternate).or(id_link)?;
    let summary = e
        .summary
        .or(e.content)
        .map(|t| t.value)
        .unwrap_or_default();
    Some(FeedEntry {
        id,
        title,
        link,
        published: non_blank(e.published).or_else(|| non_blank(e.updated)),
        summary,
        categories: Vec::new(),
    })
}

pub struct FeedAdapter {
    name: String,
    source_type: SourceType,
    tags: Vec<String>,
    max_items: usize,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl FeedAdapter {
    pub fn from_url(name: impl Into<String>, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            source_type: SourceType::Feed,
            tags: Vec::new(),
            max_items: 20,
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    /// Adapter over an in-memory document (tests, offline runs).
    pub fn from_fixture(name: impl Into<String>, xml: &str) -> Self {
        Self {
            name: name.into(),
            source_type: SourceType::Feed,
            tags: Vec::new(),
            max_items: 20,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn parse_items_from_str(&self, s: &str) -> Result<Vec<RawItem>> {
        let entries = parse_feed_document(s)
            .with_context(|| format!("feed `{}`", self.name))?;
        Ok(entries
            .into_iter()
            .take(self.max_items)
            .map(|e| {
                let mut tags = self.tags.clone();
                tags.extend(e.categories);
                RawItem {
                    source_name: self.name.clone(),
                    source_type: self.source_type,
                    title: e.title,
                    body: e.summary,
                    url: e.link,
                    published_at: e.published,
                    tags,
                }
            })
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("feed http get {url}"))?
                    .text()
                    .await
                    .context("feed http .text()")?;
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        self.source_type
    }
}

/// HTML named entities are not valid XML; fold the common ones before parsing.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Blog</title>
<item><title>First post</title><link>https://blog.example/a</link>
<pubDate>Sun, 01 Mar 2026 09:00:00 +0000</pubDate><description>Hello&nbsp;there</description></item>
<item><title></title><link>https://blog.example/empty</link></item>
<item><title>No link</title></item>
</channel></rss>"#;

    #[test]
    fn rss_skips_entries_without_title_or_link() {
        let entries = parse_feed_document(RSS).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://blog.example/a");
        assert_eq!(
            entries[0].published.as_deref(),
            Some("Sun, 01 Mar 2026 09:00:00 +0000")
        );
    }

    #[test]
    fn atom_prefers_alternate_link() {
        let atom = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title type="html">Paper title</title>
    <id>http://arxiv.org/abs/2603.00001v1</id>
    <link rel="related" href="http://arxiv.org/pdf/2603.00001v1"/>
    <link rel="alternate" href="http://arxiv.org/abs/2603.00001v1"/>
    <published>2026-03-01T08:00:00Z</published>
    <summary>Abstract text</summary>
  </entry>
</feed>"#;
        let entries = parse_feed_document(atom).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Paper title");
        assert_eq!(entries[0].link, "http://arxiv.org/abs/2603.00001v1");
        assert_eq!(entries[0].summary, "Abstract text");
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_feed_document("not xml at all").is_err());
    }
}
