// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of upstream a raw item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Feed,
    Aggregator,
    PaperIndex,
    SocialSearch,
    SocialPosts,
}

impl SourceType {
    pub const ALL: [SourceType; 5] = [
        SourceType::Feed,
        SourceType::Aggregator,
        SourceType::PaperIndex,
        SourceType::SocialSearch,
        SourceType::SocialPosts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Feed => "feed",
            SourceType::Aggregator => "aggregator",
            SourceType::PaperIndex => "paper-index",
            SourceType::SocialSearch => "social-search",
            SourceType::SocialPosts => "social-posts",
        }
    }

    /// Default representative ranking for dedup (first wins).
    pub fn default_priority() -> Vec<SourceType> {
        vec![
            SourceType::Feed,
            SourceType::PaperIndex,
            SourceType::SocialPosts,
            SourceType::SocialSearch,
            SourceType::Aggregator,
        ]
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        // Registry files written for the older tooling use these aliases.
        match s.trim().to_ascii_lowercase().as_str() {
            "feed" | "rss" | "atom" => Ok(SourceType::Feed),
            "aggregator" | "hackernews" => Ok(SourceType::Aggregator),
            "paper-index" | "arxiv" => Ok(SourceType::PaperIndex),
            "social-search" | "x" => Ok(SourceType::SocialSearch),
            "social-posts" | "linkedin" => Ok(SourceType::SocialPosts),
            other => Err(anyhow::anyhow!("unknown source type `{other}`")),
        }
    }
}

/// Minimal item shape every adapter produces. Transient, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawItem {
    pub source_name: String,
    pub source_type: SourceType,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub url: String,
    /// Source-native timestamp (RFC-2822, ISO-8601 or epoch), if any.
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch the current items. Malformed entries are skipped, not errors.
    /// Missing credentials for optional sources yield `Ok(vec![])`.
    async fn fetch_latest(&self) -> Result<Vec<RawItem>>;
    fn name(&self) -> &str;
    fn source_type(&self) -> SourceType;
}
