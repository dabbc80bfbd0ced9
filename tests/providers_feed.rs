// tests/providers_feed.rs
//
// Feed fixtures through the adapter and the normalizer, plus Hacker News against a local stub.

use axum::{extract::Path, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use daily_ai_feed::ingest::providers::feed::FeedAdapter;
use daily_ai_feed::ingest::providers::hackernews::HackerNewsAdapter;
use daily_ai_feed::ingest::types::{SourceAdapter, SourceType};
use daily_ai_feed::normalize::{normalize_all, NormalizeOptions};

const RSS_XML: &str = include_str!("fixtures/ai_blog_rss.xml");
const ATOM_XML: &str = include_str!("fixtures/ai_lab_atom.xml");

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test]
async fn rss_fixture_yields_clean_items() {
    let adapter = FeedAdapter::from_fixture("Example AI Blog", RSS_XML).with_tags(vec!["engineering".into()]);
    let raws = adapter.fetch_latest().await.expect("rss parse ok");
    assert_eq!(raws.len(), 2, "untitled and link-less entries are skipped");
    assert!(raws.iter().all(|r| r.source_type == SourceType::Feed));
    assert_eq!(raws[1].url, "https://blog.example/posts/weekly-links");
    assert!(raws[0].tags.contains(&"agents".to_string()));

    let (items, rejected) = normalize_all(&raws, &NormalizeOptions::new(chrono_tz::UTC, now()));
    assert_eq!(rejected, 0);
    assert_eq!(items[0].canonical_url, "https://blog.example/posts/agent-tests");
    assert_eq!(items[0].domain, "blog.example");
    assert_eq!(items[0].body, "We let the agent own the test suite for a week.");
    assert_eq!(items[0].published_at.to_rfc3339(), "2026-03-01T09:30:00+00:00");
    assert!(!items[0].synthetic_timestamp);
    assert!(items[0].tags.contains("engineering"));
    assert_eq!(items[1].body, "Reading list - model releases and evals.");
}

#[tokio::test]
async fn atom_fixture_prefers_alternate_and_falls_back_to_id() {
    let adapter = FeedAdapter::from_fixture("Example Lab", ATOM_XML).with_max_items(10);
    let raws = adapter.fetch_latest().await.expect("atom parse ok");
    assert_eq!(raws.len(), 2);
    assert_eq!(raws[0].url, "https://lab.example/posts/small-model");
    assert_eq!(raws[0].published_at.as_deref(), Some("2026-03-01T08:00:00-05:00"));
    assert_eq!(raws[1].url, "https://lab.example/changelog/2026-03-01");
    assert_eq!(raws[1].published_at.as_deref(), Some("2026-03-01T11:00:00Z"));

    let (items, _) = normalize_all(&raws, &NormalizeOptions::new(chrono_tz::UTC, now()));
    assert_eq!(items[0].published_at.to_rfc3339(), "2026-03-01T13:00:00+00:00");
    assert_eq!(items[1].body, "API rate limits raised.");
}

#[tokio::test]
async fn max_items_truncates_in_document_order() {
    let adapter = FeedAdapter::from_fixture("Example Lab", ATOM_XML).with_max_items(1);
    let raws = adapter.fetch_latest().await.unwrap();
    assert_eq!(raws.len(), 1);
    assert!(raws[0].title.contains("smaller reasoning model"));
}

#[tokio::test]
async fn non_xml_body_fails_the_source() {
    let adapter = FeedAdapter::from_fixture("Broken", "<html><body>502 Bad Gateway");
    assert!(adapter.fetch_latest().await.is_err());
}

async fn hn_item(Path(file): Path<String>) -> Json<Value> {
    let id = file.trim_end_matches(".json");
    Json(match id {
        "1" => json!({"type": "story", "title": "Show HN: LLM agent for Postgres migrations",
                      "url": "https://tool.example/pg", "time": 1772359200, "score": 240, "descendants": 51}),
        "2" => json!({"type": "story", "title": "A history of typewriters", "url": "https://old.example/",
                      "time": 1772359200, "score": 90}),
        "3" => json!({"type": "job", "title": "Hiring AI engineers", "url": "https://jobs.example/"}),
        "4" => json!({"type": "story", "title": "Ask HN: which LLM do you use?", "time": 1772359200}),
        _ => Value::Null,
    })
}

#[tokio::test]
async fn hackernews_keeps_matching_linked_stories() {
    let app = Router::new()
        .route("/topstories.json", get(|| async { Json(json!([1, 2, 3, 4, 5])) }))
        .route("/item/{file}", get(hn_item));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let adapter = HackerNewsAdapter::new("Hacker News", client)
        .with_base_url(&format!("http://{addr}"))
        .with_keywords(vec!["LLM".into(), "agent".into()]);
    let raws = adapter.fetch_latest().await.expect("hn fetch ok");

    assert_eq!(raws.len(), 1);
    let story = &raws[0];
    assert_eq!(story.url, "https://tool.example/pg");
    assert_eq!(story.source_type, SourceType::Aggregator);
    assert_eq!(story.published_at.as_deref(), Some("1772359200"));
    assert!(story.tags.contains(&"hn-points:240".to_string()));
    assert!(story.tags.contains(&"hn-comments:51".to_string()));
}
