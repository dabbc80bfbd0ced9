// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use crate::ingest::types::{RawItem, SourceAdapter, SourceType};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Body text length cap (chars).
pub const BODY_CHAR_CAP: usize = 1500;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Raw items returned by source adapters.");
        describe_counter!(
            "ingest_source_errors_total",
            "Source adapter fetch/parse errors."
        );
        describe_counter!(
            "ingest_source_timeouts_total",
            "Source adapters cancelled by the per-source timeout."
        );
        describe_histogram!("ingest_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_counter!(
            "pipeline_rejected_total",
            "Raw items rejected by the normalizer."
        );
        describe_counter!(
            "pipeline_dedup_merged_total",
            "Normalized items absorbed into another item's dedup group."
        );
        describe_counter!(
            "pipeline_window_dropped_total",
            "Dedup groups outside the recency window."
        );
        describe_counter!("digest_selected_total", "Items placed into digest sections.");
        describe_counter!(
            "digest_underfilled_sections_total",
            "Sections emitted below the minimum item count."
        );
        describe_counter!(
            "summarizer_fallback_total",
            "Entries that received the local template summary."
        );
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when the digest pipeline last ran."
        );
    });
}

/// Clean free text: decode entities, strip tags, fold typographic quotes, collapse whitespace.
/// Output is capped at `max_chars` characters.
pub fn clean_text(s: &str, max_chars: usize) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. nbsp)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[\s\u{00A0}]+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect::<String>().trim_end().to_string();
    }

    out
}

/// Outcome of one adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Ok { items: usize },
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub name: String,
    pub source_type: SourceType,
    pub status: SourceStatus,
}

/// Raw items of one ingestion round plus a per-source status line.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub items: Vec<RawItem>,
    pub sources: Vec<SourceReport>,
}

impl FetchReport {
    pub fn failed_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| !matches!(s.status, SourceStatus::Ok { .. }))
            .count()
    }
}

type Slot = (anyhow::Result<Vec<RawItem>>, bool, Duration);

/// Fetch all adapters concurrently, each bounded by `per_source_timeout`.
///
/// A failing or slow adapter contributes zero items; the others are unaffected.
/// Items are returned grouped in adapter order, independent of completion order.
pub async fn fetch_all(
    adapters: &[Arc<dyn SourceAdapter>],
    per_source_timeout: Duration,
) -> FetchReport {
    ensure_metrics_described();

    let mut set = JoinSet::new();
    for (idx, adapter) in adapters.iter().enumerate() {
        let adapter = Arc::clone(adapter);
        set.spawn(async move {
            let t0 = Instant::now();
            let res = tokio::time::timeout(per_source_timeout, adapter.fetch_latest()).await;
            let slot: Slot = match res {
                Ok(r) => (r, false, t0.elapsed()),
                Err(_) => (Ok(Vec::new()), true, t0.elapsed()),
            };
            (idx, slot)
        });
    }

    let mut slots: Vec<Option<Slot>> = (0..adapters.len()).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, slot)) => slots[idx] = Some(slot),
            Err(e) => tracing::warn!(target: "ingest", error = ?e, "adapter task aborted"),
        }
    }

    let mut report = FetchReport::default();
    for (adapter, slot) in adapters.iter().zip(slots) {
        let status = match slot {
            Some((Ok(mut items), false, elapsed)) => {
                histogram!("ingest_fetch_ms").record(elapsed.as_secs_f64() * 1_000.0);
                counter!("ingest_items_total").increment(items.len() as u64);
                let n = items.len();
                report.items.append(&mut items);
                tracing::debug!(target: "ingest", provider = adapter.name(), items = n, "source fetched");
                SourceStatus::Ok { items: n }
            }
            Some((_, true, _)) => {
                tracing::warn!(
                    target: "ingest",
                    provider = adapter.name(),
                    timeout_ms = per_source_timeout.as_millis() as u64,
                    "source timed out"
                );
                counter!("ingest_source_timeouts_total").increment(1);
                SourceStatus::TimedOut
            }
            Some((Err(e), false, _)) => {
                tracing::warn!(target: "ingest", error = ?e, provider = adapter.name(), "provider error");
                counter!("ingest_source_errors_total").increment(1);
                SourceStatus::Failed(format!("{e:#}"))
            }
            None => {
                counter!("ingest_source_errors_total").increment(1);
                SourceStatus::Failed("adapter task aborted".to_string())
            }
        };
        report.sources.push(SourceReport {
            name: adapter.name().to_string(),
            source_type: adapter.source_type(),
            status,
        });
    }

    tracing::info!(
        target: "ingest",
        sources = report.sources.len(),
        failed = report.failed_sources(),
        items = report.items.len(),
        "ingest round finished"
    );
    report
}
