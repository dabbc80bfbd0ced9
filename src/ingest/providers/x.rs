// src/ingest/providers/x.rs
//! X recent-search adapter (social search). Optional: without a bearer token it yields nothing.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use super::social_title;
use crate::ingest::types::{RawItem, SourceAdapter, SourceType};

pub const DEFAULT_ENDPOINT: &str = "https://api.x.com/2/tweets/search/recent";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: Option<String>,
    #[serde(default)]
    text: String,
    author_id: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    public_metrics: PublicMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    reply_count: u64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    #[serde(default)]
    username: String,
}

pub struct XSearchAdapter {
    name: String,
    query: String,
    endpoint: String,
    max_items: usize,
    token: Option<String>,
    tags: Vec<String>,
    client: reqwest::Client,
}

impl XSearchAdapter {
    pub fn new(name: impl Into<String>, query: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_items: 25,
            token: None,
            tags: Vec::new(),
            client,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// The API accepts 10..=100 results per page.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.clamp(10, 100);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn parse_response(&self, body: &str) -> Result<Vec<RawItem>> {
        let payload: SearchResponse =
            serde_json::from_str(body).with_context(|| format!("x `{}` response json", self.name))?;
        let users: HashMap<&str, &str> = payload
            .includes
            .users
            .iter()
            .map(|u| (u.id.as_str(), u.username.trim()))
            .collect();

        let mut out = Vec::with_capacity(payload.data.len());
        for tweet in &payload.data {
            let Some(id) = tweet.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
                continue;
            };
            if tweet.text.trim().is_empty() {
                continue;
            }
            let username = tweet
                .author_id
                .as_deref()
                .and_then(|a| users.get(a).copied())
                .filter(|u| !u.is_empty());
            let (source_name, url, prefix) = match username {
                Some(u) => (
                    format!("X @{u}"),
                    format!("https://x.com/{u}/status/{id}"),
                    format!("@{u}"),
                ),
                None => (
                    "X".to_string(),
                    format!("https://x.com/i/web/status/{id}"),
                    "X post".to_string(),
                ),
            };
            let mut tags = self.tags.clone();
            tags.push(format!("x-likes:{}", tweet.public_metrics.like_count));
            tags.push(format!("x-replies:{}", tweet.public_metrics.reply_count));
            out.push(RawItem {
                source_name,
                source_type: SourceType::SocialSearch,
                title: social_title(&prefix, &tweet.text, 120),
                body: tweet.text.clone(),
                url,
                published_at: tweet.created_at.clone(),
                tags,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for XSearchAdapter {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        let Some(token) = self.token.as_deref() else {
            tracing::info!(target: "ingest", provider = %self.name, "X_BEARER_TOKEN not set, skipping");
            return Ok(Vec::new());
        };
        if self.query.trim().is_empty() {
            tracing::info!(target: "ingest", provider = %self.name, "empty query, skipping");
            return Ok(Vec::new());
        }
        let max_results = self.max_items.to_string();
        let resp = self
            .client
            .get(self.endpoint.as_str())
            .bearer_auth(token)
            .query(&[
                ("query", self.query.as_str()),
                ("max_results", max_results.as_str()),
                ("tweet.fields", "created_at,public_metrics,author_id,lang"),
                ("user.fields", "username,name,verified"),
                ("expansions", "author_id"),
            ])
            .send()
            .await
            .context("x http get")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("x search failed with status {status}"));
        }
        let body = resp.text().await.context("x http .text()")?;
        self.parse_response(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::SocialSearch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_status_urls_from_includes() {
        let a = XSearchAdapter::new("X @lab", "from:lab", reqwest::Client::new());
        let body = r#"{
          "data": [
            {"id":"111","text":"New eval harness for agents is out","author_id":"9","created_at":"2026-03-01T10:00:00.000Z","public_metrics":{"like_count":40,"reply_count":3}},
            {"id":"112","text":"","author_id":"9"},
            {"id":"113","text":"anonymous post"}
          ],
          "includes": {"users": [{"id":"9","username":"lab"}]}
        }"#;
        let items = a.parse_response(body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://x.com/lab/status/111");
        assert_eq!(items[0].source_name, "X @lab");
        assert_eq!(items[0].title, "@lab: New eval harness for agents is out");
        assert_eq!(items[1].url, "https://x.com/i/web/status/113");
    }

    #[tokio::test]
    async fn missing_token_yields_no_items() {
        let a = XSearchAdapter::new("X", "from:lab", reqwest::Client::new()).with_token(None);
        assert!(a.fetch_latest().await.unwrap().is_empty());
    }
}
