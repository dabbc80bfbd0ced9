// src/ingest/providers/arxiv.rs
//! arXiv API adapter (paper index). The API answers with an Atom document.

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::feed::parse_feed_document;
use crate::ingest::types::{RawItem, SourceAdapter, SourceType};

pub const DEFAULT_ENDPOINT: &str = "http://export.arxiv.org/api/query";
pub const DEFAULT_QUERY: &str = "cat:cs.AI+OR+cat:cs.LG";

pub struct ArxivAdapter {
    name: String,
    query: String,
    endpoint: String,
    max_items: usize,
    tags: Vec<String>,
    client: reqwest::Client,
}

impl ArxivAdapter {
    pub fn new(name: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            query: DEFAULT_QUERY.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_items: 40,
            tags: Vec::new(),
            client,
        }
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.trim().to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('?').to_string();
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn request_url(&self) -> String {
        format!(
            "{}?search_query={}&sortBy=submittedDate&sortOrder=descending&start=0&max_results={}",
            self.endpoint, self.query, self.max_items
        )
    }

    /// Entries keyed by their abstract page (`<id>`), falling back to the alternate link.
    pub fn parse_items_from_str(&self, s: &str) -> Result<Vec<RawItem>> {
        let entries = parse_feed_document(s).with_context(|| format!("arxiv `{}`", self.name))?;
        Ok(entries
            .into_iter()
            .take(self.max_items)
            .map(|e| RawItem {
                source_name: self.name.clone(),
                source_type: SourceType::PaperIndex,
                title: e.title,
                body: e.summary.trim().to_string(),
                url: e.id.filter(|id| id.starts_with("http")).unwrap_or(e.link),
                published_at: e.published,
                tags: self.tags.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for ArxivAdapter {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        let url = self.request_url();
        let body = self
            .client
            .get(url.as_str())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("arxiv http get {url}"))?
            .text()
            .await
            .context("arxiv http .text()")?;
        self.parse_items_from_str(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::PaperIndex
    }
}
