// tests/metrics.rs
//
// One recorder per process, so this file holds the only test that installs it.

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use daily_ai_feed::config::DigestConfig;
use daily_ai_feed::ingest::fetch_all;
use daily_ai_feed::ingest::providers::sample::SampleAdapter;
use daily_ai_feed::ingest::types::SourceAdapter;
use daily_ai_feed::metrics::Metrics;
use daily_ai_feed::pipeline::curate;

#[tokio::test]
async fn metrics_endpoint_contains_pipeline_series() {
    let m = Metrics::init().expect("recorder installs once");

    let now = Utc::now();
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(SampleAdapter::new(now.fixed_offset()))];
    let report = fetch_all(&adapters, Duration::from_secs(5)).await;
    let cfg = DigestConfig::builtin().unwrap();
    let curated = curate(&report.items, &cfg, now).unwrap();
    assert!(curated.digest.item_count() > 0);

    let resp = m
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "ingest_items_total",
        "ingest_fetch_ms",
        "digest_selected_total",
        "pipeline_last_run_ts",
    ] {
        assert!(text.contains(needle), "missing series {needle} in:\n{text}");
    }
    assert!(text.contains("category=\"big-announcements\""));
}
