//! Daily AI Feed: binary entrypoint.
//! Builds one digest (fetch, curate, summarize, archive) and optionally serves the archive.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use daily_ai_feed::archive::ArchiveStore;
use daily_ai_feed::config::DigestConfig;
use daily_ai_feed::ingest::config::{self as sources, SourceCredentials};
use daily_ai_feed::ingest::providers::sample::SampleAdapter;
use daily_ai_feed::ingest::types::SourceAdapter;
use daily_ai_feed::metrics::Metrics;
use daily_ai_feed::pipeline::{self, DailyRun, Pipeline};
use daily_ai_feed::selection::SectionBounds;
use daily_ai_feed::summarizer;

#[derive(Parser)]
#[command(name = "daily-ai-feed")]
#[command(about = "Generate the daily AI feed digest and archive it as JSON")]
struct Args {
    /// Digest date (YYYY-MM-DD); defaults to today in the configured time zone
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Digest configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source list (TOML `[[sources]]` or JSON array)
    #[arg(long)]
    sources: Option<PathBuf>,

    /// Markdown feed registry (URLs, LinkedIn users, X users)
    #[arg(long, default_value = "config/feeds.md")]
    feeds_file: PathBuf,

    /// Directory the latest snapshot and the archive are written to
    #[arg(long, default_value = "site")]
    output_dir: PathBuf,

    #[arg(long)]
    min_per_section: Option<usize>,

    #[arg(long)]
    max_per_section: Option<usize>,

    /// Use local sample data and skip all network requests for sources
    #[arg(long)]
    sample: bool,

    /// Replace an existing archive entry for the date
    #[arg(long)]
    force: bool,

    /// Serve the archive on this address after the build (e.g. 127.0.0.1:8080)
    #[arg(long)]
    serve: Option<String>,

    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long)]
    quiet: bool,
}

/// `RUST_LOG` wins; otherwise the level follows -v / -q. `DIGEST_LOG_JSON=1` selects JSON lines.
fn init_tracing(args: &Args) {
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let json = std::env::var("DIGEST_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn section_bounds(cfg: &DigestConfig, args: &Args) -> Result<SectionBounds> {
    let mut b = cfg.run.bounds();
    if let Some(min) = args.min_per_section {
        b.min_per_section = min;
    }
    if let Some(max) = args.max_per_section {
        b.max_per_section = max;
    }
    if b.max_per_section == 0 || b.min_per_section > b.max_per_section {
        bail!(
            "invalid section bounds: min {} / max {}",
            b.min_per_section,
            b.max_per_section
        );
    }
    Ok(b)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Local .env for API keys and overrides; absent in most deployments.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args);

    // Configuration defects stop the run before any network traffic.
    let cfg = DigestConfig::load(args.config.as_deref()).context("loading digest config")?;
    let pipeline = Pipeline::from_config(&cfg)?.with_bounds(section_bounds(&cfg, &args)?);

    let metrics = if args.serve.is_some() {
        match Metrics::init() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "metrics disabled");
                None
            }
        }
    } else {
        None
    };

    let adapters: Vec<Arc<dyn SourceAdapter>> = if args.sample {
        tracing::info!("using sample data, sources skipped");
        let published = Utc::now().with_timezone(&pipeline.tz()).fixed_offset();
        vec![Arc::new(SampleAdapter::new(published))]
    } else {
        let specs = sources::load_sources(args.sources.as_deref(), Some(&args.feeds_file))?;
        if specs.is_empty() {
            tracing::warn!("no sources configured");
        }
        let client = sources::http_client(cfg.run.fetch_timeout())?;
        sources::build_adapters(&specs, &client, &SourceCredentials::from_env())
    };

    let summarizer = summarizer::build_summarizer(&cfg.summarizer);
    let store = ArchiveStore::new(&args.output_dir);

    let summary = pipeline::run_daily(
        &pipeline,
        DailyRun {
            adapters: &adapters,
            summarizer: summarizer.as_ref(),
            store: &store,
            prompts_dir: cfg.summarizer.prompts_dir.clone(),
            fetch_timeout: cfg.run.fetch_timeout(),
            now: None,
            date: args.date,
            replace: args.force,
        },
    )
    .await?;

    tracing::info!(
        date = %summary.digest.date,
        items = summary.digest.item_count(),
        fallbacks = summary.fallbacks,
        outcome = ?summary.outcome,
        output = %args.output_dir.display(),
        "digest generated"
    );

    if let Some(addr) = args.serve.as_deref() {
        let mut app = daily_ai_feed::router(store);
        if let Some(m) = &metrics {
            app = app.merge(m.router());
        }
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind {addr}"))?;
        tracing::info!(%addr, "serving archive");
        axum::serve(listener, app).await.context("http server")?;
    }

    Ok(())
}
