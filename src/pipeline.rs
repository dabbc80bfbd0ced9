// src/pipeline.rs
//! Stage wiring.
//!
//! [`Pipeline::curate`] is the pure core: normalize → dedupe → window → score → select over
//! one in-memory batch, anchored at an explicit `now`. [`run_daily`] wraps it with ingestion,
//! summarization and archiving.

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use metrics::{counter, gauge};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::archive::{ArchiveStore, WriteOutcome};
use crate::category::Category;
use crate::config::{ConfigError, DigestConfig, NormalizeConfig};
use crate::dedup::{self, DedupOptions};
use crate::ingest::{self, types::RawItem, types::SourceAdapter, FetchReport};
use crate::normalize;
use crate::scoring::ScoringEngine;
use crate::selection::{self, Digest, RunStamp, SectionBounds};
use crate::summarizer::{self, Summarizer};
use crate::window;

/// Per-stage counts of one curation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurateStats {
    pub raw: usize,
    pub rejected: usize,
    pub normalized: usize,
    pub groups: usize,
    pub in_window: usize,
    pub eligible: usize,
    pub selected: usize,
    pub underfilled_sections: usize,
}

#[derive(Debug, Clone)]
pub struct Curated {
    pub digest: Digest,
    pub stats: CurateStats,
}

/// Validated, read-only inputs of the core stages.
#[derive(Debug)]
pub struct Pipeline {
    tz: Tz,
    window_hours: u32,
    normalize: NormalizeConfig,
    dedup: DedupOptions,
    engine: ScoringEngine,
    bounds: SectionBounds,
}

impl Pipeline {
    pub fn from_config(cfg: &DigestConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            tz: cfg.tz()?,
            window_hours: cfg.run.window_hours,
            normalize: cfg.normalize.clone(),
            dedup: cfg.dedup.options()?,
            engine: cfg.scoring_engine()?,
            bounds: cfg.run.bounds(),
        })
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Override section bounds (CLI flags). Callers keep `min <= max`.
    pub fn with_bounds(mut self, bounds: SectionBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Run stamp for `now`; `date` defaults to `now`'s local date in the run zone.
    pub fn stamp(&self, now: DateTime<Utc>, date: Option<NaiveDate>) -> RunStamp {
        let local = now.with_timezone(&self.tz);
        RunStamp {
            date: date.unwrap_or_else(|| local.date_naive()),
            timezone: self.tz.name().to_string(),
            generated_at: local.fixed_offset(),
        }
    }

    /// The pure core. Never fails; empty input yields six empty, under-filled sections.
    pub fn curate(&self, raw: &[RawItem], stamp: &RunStamp) -> Curated {
        let now = stamp.generated_at;
        let opts = self.normalize.options(self.tz, now.with_timezone(&Utc));

        let (items, rejected) = normalize::normalize_all(raw, &opts);
        let normalized = items.len();
        let groups = dedup::dedupe(&items, &self.dedup);
        let group_count = groups.len();
        let kept = window::filter(groups, &now, self.window_hours);
        let in_window = kept.len();
        let scored = self.engine.score_all(&kept, &now);
        let eligible = scored.iter().filter(|s| !s.eligible.is_empty()).count();
        let digest = selection::select(&scored, &Category::ALL, &self.bounds, stamp);

        let stats = CurateStats {
            raw: raw.len(),
            rejected,
            normalized,
            groups: group_count,
            in_window,
            eligible,
            selected: digest.item_count(),
            underfilled_sections: digest.sections.iter().filter(|s| s.under_filled).count(),
        };
        record_selection(&digest);
        tracing::info!(
            target: "pipeline",
            raw = stats.raw,
            rejected = stats.rejected,
            groups = stats.groups,
            in_window = stats.in_window,
            eligible = stats.eligible,
            selected = stats.selected,
            underfilled = stats.underfilled_sections,
            "curation finished"
        );
        Curated { digest, stats }
    }
}

fn record_selection(digest: &Digest) {
    ingest::ensure_metrics_described();
    for s in &digest.sections {
        counter!("digest_selected_total", "category" => s.category.slug())
            .increment(s.items.len() as u64);
        if s.under_filled {
            counter!("digest_underfilled_sections_total", "category" => s.category.slug())
                .increment(1);
            tracing::info!(
                target: "pipeline",
                section = s.category.slug(),
                items = s.items.len(),
                diversity_relaxed = s.diversity_relaxed,
                "section under-filled"
            );
        } else if s.diversity_relaxed {
            tracing::debug!(target: "pipeline", section = s.category.slug(), "domain cap relaxed");
        }
    }
}

/// Convenience over [`Pipeline::from_config`] + [`Pipeline::curate`].
pub fn curate(raw: &[RawItem], cfg: &DigestConfig, now: DateTime<Utc>) -> Result<Curated, ConfigError> {
    let p = Pipeline::from_config(cfg)?;
    let stamp = p.stamp(now, None);
    Ok(p.curate(raw, &stamp))
}

/// Inputs of one daily build beyond the configuration.
pub struct DailyRun<'a> {
    pub adapters: &'a [Arc<dyn SourceAdapter>],
    pub summarizer: &'a dyn Summarizer,
    pub store: &'a ArchiveStore,
    pub prompts_dir: PathBuf,
    pub fetch_timeout: Duration,
    /// Run clock. `None` reads the wall clock once ingestion has finished.
    pub now: Option<DateTime<Utc>>,
    /// Digest date label; defaults to `now`'s local date.
    pub date: Option<NaiveDate>,
    /// Replace an existing, different archive entry for the date.
    pub replace: bool,
}

#[derive(Debug)]
pub struct RunSummary {
    pub digest: Digest,
    pub stats: CurateStats,
    pub fetch: FetchReport,
    pub fallbacks: usize,
    pub outcome: WriteOutcome,
}

/// Fetch → curate → summarize → archive.
///
/// Without `replace`, a date that is already archived with the same selection is kept as is
/// and the summarizer is not called. A different selection for that date is an error raised
/// before any summarization.
pub async fn run_daily(pipeline: &Pipeline, run: DailyRun<'_>) -> Result<RunSummary> {
    tracing::info!(
        target: "pipeline",
        sources = run.adapters.len(),
        "daily run started"
    );

    let fetch = ingest::fetch_all(run.adapters, run.fetch_timeout).await;
    // stamped after ingestion so items published mid-fetch are not future-dated
    let now = run.now.unwrap_or_else(Utc::now);
    let stamp = pipeline.stamp(now, run.date);
    let Curated { mut digest, stats } = pipeline.curate(&fetch.items, &stamp);
    tracing::info!(
        target: "pipeline",
        date = %stamp.date,
        tz = %stamp.timezone,
        items = digest.item_count(),
        "digest curated"
    );

    if !run.replace {
        if let Some(existing) = run.store.load_date(digest.date)? {
            if !existing.same_selection(&digest) {
                bail!(
                    "archive for {} already holds a different selection (use --force to replace)",
                    digest.date
                );
            }
            tracing::info!(
                target: "pipeline",
                date = %digest.date,
                "selection unchanged, keeping archived digest"
            );
            // refreshes latest.json and the index; the dated file keeps its content
            run.store.write(&existing, true)?;
            gauge!("pipeline_last_run_ts").set(now.timestamp() as f64);
            return Ok(RunSummary {
                digest: existing,
                stats,
                fetch,
                fallbacks: 0,
                outcome: WriteOutcome::Unchanged,
            });
        }
    }

    if digest.item_count() == 0 {
        tracing::warn!(
            target: "pipeline",
            raw = stats.raw,
            failed_sources = fetch.failed_sources(),
            "no articles survived curation; writing an empty digest"
        );
    }

    let fallbacks = summarizer::enrich_digest(&mut digest, run.summarizer, &run.prompts_dir).await;
    let outcome = run.store.write(&digest, run.replace)?;
    gauge!("pipeline_last_run_ts").set(now.timestamp() as f64);

    Ok(RunSummary {
        digest,
        stats,
        fetch,
        fallbacks,
        outcome,
    })
}
