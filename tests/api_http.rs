// tests/api_http.rs
//
// HTTP-level tests for the archive Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, NaiveDate};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use daily_ai_feed::api;
use daily_ai_feed::archive::ArchiveStore;
use daily_ai_feed::category::Category;
use daily_ai_feed::selection::{Digest, DigestSection};

const BODY_LIMIT: usize = 1024 * 1024;

fn empty_digest(date: &str) -> Digest {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    Digest {
        title: Digest::title_for(date),
        date,
        timezone: "UTC".into(),
        generated_at: DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z").unwrap(),
        sections: Category::ALL.iter().map(|c| DigestSection::empty(*c)).collect(),
    }
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

#[tokio::test]
async fn health_returns_200_and_ok_body() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = get(api::router(ArchiveStore::new(dir.path())), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap().trim(), "OK");
}

#[tokio::test]
async fn latest_is_404_before_the_first_run() {
    let dir = tempfile::tempdir().unwrap();
    let (status, _) = get(api::router(ArchiveStore::new(dir.path())), "/digest/latest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn published_digests_are_served() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArchiveStore::new(dir.path());
    store.write(&empty_digest("2026-02-28"), false).unwrap();
    store.write(&empty_digest("2026-03-01"), false).unwrap();
    let app = api::router(store);

    let (status, body) = get(app.clone(), "/digest/latest").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["date"], "2026-03-01");
    assert_eq!(v["sections"].as_array().map(Vec::len), Some(6));
    assert_eq!(v["sections"][0]["category"], "big-announcements");

    let (status, body) = get(app.clone(), "/digest/2026-02-28").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["title"], "Daily AI Feed - 2026-02-28");

    let (status, body) = get(app.clone(), "/archive").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    let dates: Vec<_> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["date"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(dates, vec!["2026-03-01", "2026-02-28"]);

    let (status, body) = get(app, "/files/latest.json").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["date"], "2026-03-01");
}

#[tokio::test]
async fn bad_and_unknown_dates() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArchiveStore::new(dir.path());
    store.write(&empty_digest("2026-03-01"), false).unwrap();
    let app = api::router(store);

    let (status, _) = get(app.clone(), "/digest/yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get(app, "/digest/2025-12-31").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
