// src/ingest/providers/linkedin.rs
//! LinkedIn posts adapter (social posts), by author URN. Optional: no token, no items.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::social_title;
use crate::ingest::types::{RawItem, SourceAdapter, SourceType};

pub const DEFAULT_ENDPOINT: &str = "https://api.linkedin.com/rest/posts";
pub const DEFAULT_API_VERSION: &str = "202503";

const TEXT_KEYS: [&str; 6] = [
    "text",
    "commentary",
    "shareCommentary",
    "description",
    "title",
    "message",
];
const TIME_KEYS: [&str; 4] = ["publishedAt", "lastModifiedAt", "createdAt", "firstPublishedAt"];

pub struct LinkedInAdapter {
    name: String,
    author_urn: String,
    endpoint: String,
    api_version: String,
    max_items: usize,
    token: Option<String>,
    tags: Vec<String>,
    client: reqwest::Client,
}

impl LinkedInAdapter {
    pub fn new(name: impl Into<String>, author_urn: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            author_urn: author_urn.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            max_items: 20,
            token: None,
            tags: Vec::new(),
            client,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_api_version(mut self, v: &str) -> Self {
        self.api_version = v.trim().to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.clamp(5, 100);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn parse_response(&self, body: &str) -> Result<Vec<RawItem>> {
        let payload: Value = serde_json::from_str(body)
            .with_context(|| format!("linkedin `{}` response json", self.name))?;
        let rows = ["elements", "data", "results"]
            .iter()
            .find_map(|k| payload.get(*k).and_then(Value::as_array))
            .cloned()
            .unwrap_or_default();

        let mut out = Vec::with_capacity(rows.len());
        for row in rows.iter().filter(|r| r.is_object()) {
            let text = extract_text(row);
            if text.trim().is_empty() {
                continue;
            }
            let post_id = ["id", "urn", "entityUrn"]
                .iter()
                .find_map(|k| row.get(*k).and_then(scalar_string))
                .unwrap_or_default();
            let permalink = ["permalink", "url"]
                .iter()
                .find_map(|k| row.get(*k).and_then(Value::as_str))
                .map(str::to_string);
            let Some(url) = permalink.or_else(|| post_url(&post_id)) else {
                continue;
            };
            let published_at = TIME_KEYS
                .iter()
                .find_map(|k| row.get(*k).and_then(timestamp_string));
            out.push(RawItem {
                source_name: self.name.clone(),
                source_type: SourceType::SocialPosts,
                title: social_title("LinkedIn", &text, 120),
                body: text,
                url,
                published_at,
                tags: self.tags.clone(),
            });
        }
        Ok(out)
    }
}

/// First non-empty text found under the preferred keys, searched depth-first.
pub fn extract_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(extract_text)
            .find(|s| !s.is_empty())
            .unwrap_or_default(),
        Value::Object(map) => {
            for k in TEXT_KEYS {
                if let Some(child) = map.get(k) {
                    let found = extract_text(child);
                    if !found.is_empty() {
                        return found;
                    }
                }
            }
            map.values()
                .map(extract_text)
                .find(|s| !s.is_empty())
                .unwrap_or_default()
        }
        _ => String::new(),
    }
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Epoch numbers pass through as digits (milliseconds are detected downstream);
/// `{ "time": .. }` wrappers are unwrapped.
fn timestamp_string(v: &Value) -> Option<String> {
    match v {
        Value::Object(m) => m
            .get("time")
            .or_else(|| m.get("created"))
            .and_then(timestamp_string),
        Value::Number(n) => n.as_i64().map(|x| x.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn post_url(post_id: &str) -> Option<String> {
    if post_id.is_empty() {
        return None;
    }
    let mut encoded = String::with_capacity(post_id.len());
    for b in post_id.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b':' | b'-' | b'_' | b'.' | b'~') {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{b:02X}"));
        }
    }
    Some(format!("https://www.linkedin.com/feed/update/{encoded}/"))
}

#[async_trait]
impl SourceAdapter for LinkedInAdapter {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        let Some(token) = self.token.as_deref() else {
            tracing::info!(target: "ingest", provider = %self.name, "LINKEDIN_ACCESS_TOKEN not set, skipping");
            return Ok(Vec::new());
        };
        if !self.author_urn.starts_with("urn:li:") {
            tracing::info!(target: "ingest", provider = %self.name, "missing author urn, skipping");
            return Ok(Vec::new());
        }
        let count = self.max_items.to_string();
        let resp = self
            .client
            .get(self.endpoint.as_str())
            .bearer_auth(token)
            .header("LinkedIn-Version", self.api_version.as_str())
            .header("X-Restli-Protocol-Version", "2.0.0")
            .query(&[
                ("q", "author"),
                ("author", self.author_urn.as_str()),
                ("count", count.as_str()),
                ("sortBy", "LAST_MODIFIED"),
            ])
            .send()
            .await
            .context("linkedin http get")?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("linkedin posts failed with status {status}"));
        }
        let body = resp.text().await.context("linkedin http .text()")?;
        self.parse_response(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::SocialPosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_text_prefers_known_keys() {
        let v = json!({"author": "urn:li:person:1", "commentary": "Shipping our eval suite"});
        assert_eq!(extract_text(&v), "Shipping our eval suite");
        let nested = json!({"content": {"article": {"title": "Deep title"}}});
        assert_eq!(extract_text(&nested), "Deep title");
    }

    #[test]
    fn rows_without_text_or_locator_are_skipped() {
        let a = LinkedInAdapter::new("LinkedIn Org", "urn:li:organization:1", reqwest::Client::new());
        let body = json!({
            "elements": [
                {"id": "urn:li:share:42", "commentary": "We open-sourced our agent runtime", "publishedAt": 1772366400000u64},
                {"id": "urn:li:share:43", "commentary": ""},
                {"commentary": "no id, no url"}
            ]
        })
        .to_string();
        let items = a.parse_response(&body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://www.linkedin.com/feed/update/urn:li:share:42/");
        assert_eq!(items[0].published_at.as_deref(), Some("1772366400000"));
        assert!(items[0].title.starts_with("LinkedIn: We open-sourced"));
    }
}
