// src/ingest/providers/sample.rs
//! Deterministic offline items, one template per category, for `--sample` runs.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::category::Category;
use crate::ingest::types::{RawItem, SourceAdapter, SourceType};

pub const SAMPLE_ITEM_COUNT: usize = 30;

const TEMPLATES: [(&str, Category); 6] = [
    (
        "Major model provider launches multimodal coding agent",
        Category::BigAnnouncements,
    ),
    (
        "Engineering team replaces flaky tests with AI-generated fixtures",
        Category::Engineering,
    ),
    (
        "PM team ships weekly experiments with AI-generated specs",
        Category::ProductDevelopment,
    ),
    (
        "Solo founder reaches $42k MRR with AI-native support desk",
        Category::Business,
    ),
    (
        "Tiny blog shows 10x prompt compression trick for retrieval",
        Category::UnderTheRadar,
    ),
    (
        "AI turns childhood doodles into playable arcade games",
        Category::ForFun,
    ),
];

pub struct SampleAdapter {
    published_at: DateTime<FixedOffset>,
}

impl SampleAdapter {
    /// All items are stamped `published_at`, usually the run's `now`.
    pub fn new(published_at: DateTime<FixedOffset>) -> Self {
        Self { published_at }
    }

    pub fn items(&self) -> Vec<RawItem> {
        (0..SAMPLE_ITEM_COUNT)
            .map(|idx| {
                let (title, hint) = TEMPLATES[idx % TEMPLATES.len()];
                RawItem {
                    source_name: "Sample Source".to_string(),
                    source_type: SourceType::Feed,
                    title: format!("{title} ({})", idx + 1),
                    body: format!("Sample content for {}.", hint.slug()),
                    url: format!("https://example.com/post-{idx}"),
                    published_at: Some(self.published_at.to_rfc3339()),
                    tags: vec![hint.slug().to_string()],
                }
            })
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for SampleAdapter {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        Ok(self.items())
    }

    fn name(&self) -> &str {
        "Sample Source"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_items_cycle_through_templates() {
        let now = DateTime::parse_from_rfc3339("2026-03-01T12:00:00+00:00").unwrap();
        let items = SampleAdapter::new(now).items();
        assert_eq!(items.len(), SAMPLE_ITEM_COUNT);
        assert_eq!(items[6].tags, vec!["big-announcements".to_string()]);
        assert_eq!(items[29].url, "https://example.com/post-29");
        assert!(items[0].title.ends_with("(1)"));
    }
}
