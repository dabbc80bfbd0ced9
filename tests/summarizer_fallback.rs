// tests/summarizer_fallback.rs
//
// Every selected entry gets copy, whatever the summarizer does.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use std::collections::BTreeMap;

use daily_ai_feed::category::Category;
use daily_ai_feed::ingest::types::SourceType;
use daily_ai_feed::selection::{Digest, DigestEntry, DigestSection};
use daily_ai_feed::summarizer::{
    enrich_digest, fallback_copy, DisabledSummarizer, Summarizer, FALLBACK_SUMMARY_MAX_CHARS,
};

struct AlwaysFails;

#[async_trait]
impl Summarizer for AlwaysFails {
    fn name(&self) -> &'static str {
        "always-fails"
    }
    async fn summarize(&self, _c: Category, _e: &DigestEntry, _g: &str) -> Result<(String, String)> {
        bail!("upstream unavailable")
    }
}

/// Succeeds for titles containing "good", returns blanks for "blank", fails otherwise.
struct Picky;

#[async_trait]
impl Summarizer for Picky {
    fn name(&self) -> &'static str {
        "picky"
    }
    async fn summarize(&self, _c: Category, e: &DigestEntry, guidance: &str) -> Result<(String, String)> {
        if e.title.contains("good") {
            Ok((format!("LLM: {}", e.title), format!("Because {guidance}")))
        } else if e.title.contains("blank") {
            Ok((String::new(), "  ".into()))
        } else {
            bail!("refused")
        }
    }
}

fn entry(title: &str, body: &str) -> DigestEntry {
    DigestEntry {
        title: title.into(),
        canonical_url: format!("https://example.com/{}", title.replace(' ', "-")),
        source_name: "Example Source".into(),
        source_type: SourceType::Feed,
        domain: "example.com".into(),
        published_at: DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z").unwrap(),
        synthetic_timestamp: false,
        group_id: title.replace(' ', "-"),
        score: 5.0,
        category_scores: BTreeMap::new(),
        body: body.into(),
        summary: String::new(),
        why_it_matters: String::new(),
    }
}

fn digest() -> Digest {
    let mut sections: Vec<DigestSection> = Category::ALL.iter().map(|c| DigestSection::empty(*c)).collect();
    sections[1].items = vec![
        entry("good engineering story", "Teams ship agents."),
        entry("blank engineering story", ""),
    ];
    sections[5].items = vec![entry("weird fun story", &"Long body sentence. ".repeat(30))];
    Digest {
        title: Digest::title_for(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()),
        date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        timezone: "UTC".into(),
        generated_at: DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z").unwrap(),
        sections,
    }
}

fn assert_all_filled(d: &Digest) {
    for e in d.entries() {
        assert!(!e.summary.trim().is_empty(), "{} has no summary", e.title);
        assert!(!e.why_it_matters.trim().is_empty(), "{} has no why", e.title);
    }
}

#[tokio::test]
async fn failing_summarizer_still_fills_every_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut d = digest();
    let fallbacks = enrich_digest(&mut d, &AlwaysFails, dir.path()).await;
    assert_eq!(fallbacks, 3);
    assert_all_filled(&d);

    let blank = &d.sections[1].items[1];
    assert_eq!(blank.summary, "blank engineering story");
    let fun = &d.sections[5].items[0];
    assert!(fun.summary.chars().count() <= FALLBACK_SUMMARY_MAX_CHARS);
    assert_eq!(
        fun.why_it_matters,
        format!(
            "This matters for {}, based on this update from Example Source.",
            Category::ForFun.lens()
        )
    );
}

#[tokio::test]
async fn partial_success_mixes_llm_and_fallback_copy() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("engineering.md"), "Think like a staff engineer.").unwrap();
    let mut d = digest();
    let fallbacks = enrich_digest(&mut d, &Picky, dir.path()).await;
    assert_eq!(fallbacks, 2);
    assert_all_filled(&d);

    let good = &d.sections[1].items[0];
    assert_eq!(good.summary, "LLM: good engineering story");
    assert_eq!(good.why_it_matters, "Because Think like a staff engineer.");
    let blank = &d.sections[1].items[1];
    assert_eq!(blank.summary, "blank engineering story");
}

#[tokio::test]
async fn disabled_summarizer_matches_fallback_copy() {
    let dir = tempfile::tempdir().unwrap();
    let mut d = digest();
    enrich_digest(&mut d, &DisabledSummarizer, dir.path()).await;
    let e = &d.sections[1].items[0];
    let (s, w) = fallback_copy(&entry("good engineering story", "Teams ship agents."), Category::Engineering);
    assert_eq!(e.summary, s);
    assert_eq!(e.why_it_matters, w);
}
