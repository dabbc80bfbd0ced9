// src/ingest/providers/hackernews.rs
//! Hacker News (Firebase API) aggregator adapter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::task::JoinSet;

use crate::ingest::types::{RawItem, SourceAdapter, SourceType};

pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

#[derive(Debug, Clone, Deserialize)]
pub struct HnItem {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Unix seconds.
    pub time: Option<i64>,
    pub score: Option<u64>,
    pub descendants: Option<u64>,
}

pub struct HackerNewsAdapter {
    name: String,
    base_url: String,
    listing: String,
    max_items: usize,
    keywords: Vec<String>,
    tags: Vec<String>,
    client: reqwest::Client,
}

impl HackerNewsAdapter {
    pub fn new(name: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            listing: "top".to_string(),
            max_items: 60,
            keywords: Vec::new(),
            tags: Vec::new(),
            client,
        }
    }

    /// `top`, `new` or `best`.
    pub fn with_listing(mut self, listing: &str) -> Self {
        let l = listing.trim().to_ascii_lowercase();
        self.listing = l.trim_end_matches("stories").to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Keep stories with a title and external URL that pass the keyword filter.
    pub fn item_to_raw(&self, it: HnItem) -> Option<RawItem> {
        if it.kind.as_deref() != Some("story") {
            return None;
        }
        let title = it.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
        let url = it.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())?;
        let text = it.text.unwrap_or_default();
        if !self.keywords.is_empty() {
            let blob = format!("{title} {text}").to_lowercase();
            if !self.keywords.iter().any(|k| blob.contains(k.as_str())) {
                return None;
            }
        }
        let mut tags = self.tags.clone();
        tags.push(format!("hn-points:{}", it.score.unwrap_or(0)));
        tags.push(format!("hn-comments:{}", it.descendants.unwrap_or(0)));
        Some(RawItem {
            source_name: self.name.clone(),
            source_type: SourceType::Aggregator,
            title,
            body: text,
            url,
            published_at: it.time.map(|t| t.to_string()),
            tags,
        })
    }

    async fn fetch_item(client: reqwest::Client, url: String) -> Option<HnItem> {
        let resp = client.get(url.as_str()).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.json::<Option<HnItem>>().await.ok().flatten()
    }
}

#[async_trait]
impl SourceAdapter for HackerNewsAdapter {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        let ids_url = format!("{}/{}stories.json", self.base_url, self.listing);
        let ids: Vec<u64> = self
            .client
            .get(ids_url.as_str())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("hackernews http get {ids_url}"))?
            .json()
            .await
            .context("hackernews story ids json")?;

        let mut set = JoinSet::new();
        for (idx, id) in ids.into_iter().take(self.max_items).enumerate() {
            let url = format!("{}/item/{id}.json", self.base_url);
            let client = self.client.clone();
            set.spawn(async move { (idx, Self::fetch_item(client, url).await) });
        }
        let mut fetched: Vec<(usize, HnItem)> = Vec::new();
        while let Some(joined) = set.join_next().await {
            if let Ok((idx, Some(item))) = joined {
                fetched.push((idx, item));
            }
        }
        // listing order, not completion order
        fetched.sort_by_key(|(idx, _)| *idx);

        Ok(fetched
            .into_iter()
            .filter_map(|(_, it)| self.item_to_raw(it))
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::Aggregator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(json: &str) -> HnItem {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn keeps_stories_with_urls_and_tags_points() {
        let a = HackerNewsAdapter::new("Hacker News", reqwest::Client::new());
        let raw = a
            .item_to_raw(item(
                r#"{"type":"story","title":"Show HN: tiny agent","url":"https://x.dev/a","time":1772366400,"score":120,"descendants":33}"#,
            ))
            .unwrap();
        assert_eq!(raw.published_at.as_deref(), Some("1772366400"));
        assert!(raw.tags.contains(&"hn-points:120".to_string()));

        assert!(a
            .item_to_raw(item(r#"{"type":"comment","title":"x","url":"https://x.dev"}"#))
            .is_none());
        assert!(a
            .item_to_raw(item(r#"{"type":"story","title":"Ask HN: anything?"}"#))
            .is_none());
    }

    #[test]
    fn keyword_filter_checks_title_and_text() {
        let a = HackerNewsAdapter::new("HN", reqwest::Client::new())
            .with_keywords(vec!["LLM".into()]);
        assert!(a
            .item_to_raw(item(r#"{"type":"story","title":"Rust 2.0","url":"https://r.dev"}"#))
            .is_none());
        assert!(a
            .item_to_raw(item(
                r#"{"type":"story","title":"Rust 2.0","url":"https://r.dev","text":"now with llm hints"}"#
            ))
            .is_some());
    }

    #[test]
    fn listing_accepts_suffix() {
        let a = HackerNewsAdapter::new("HN", reqwest::Client::new()).with_listing("newstories");
        assert_eq!(a.listing, "new");
    }
}
