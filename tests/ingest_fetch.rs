// tests/ingest_fetch.rs
//
// Concurrent fetch: failures and timeouts are isolated, output follows adapter order.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use daily_ai_feed::ingest::fetch_all;
use daily_ai_feed::ingest::types::{RawItem, SourceAdapter, SourceType};
use daily_ai_feed::ingest::SourceStatus;

enum Behaviour {
    Items(usize),
    Fail,
    Sleep(Duration, usize),
}

struct Stub {
    name: &'static str,
    behaviour: Behaviour,
}

impl Stub {
    fn arc(name: &'static str, behaviour: Behaviour) -> Arc<dyn SourceAdapter> {
        Arc::new(Self { name, behaviour })
    }

    fn items(&self, n: usize) -> Vec<RawItem> {
        (0..n)
            .map(|i| RawItem {
                source_name: self.name.to_string(),
                source_type: SourceType::Feed,
                title: format!("{} story {i}", self.name),
                body: String::new(),
                url: format!("https://{}.example/{i}", self.name),
                published_at: None,
                tags: vec![],
            })
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for Stub {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>> {
        match self.behaviour {
            Behaviour::Items(n) => Ok(self.items(n)),
            Behaviour::Fail => bail!("upstream 503"),
            Behaviour::Sleep(d, n) => {
                tokio::time::sleep(d).await;
                Ok(self.items(n))
            }
        }
    }

    fn name(&self) -> &str {
        self.name
    }

    fn source_type(&self) -> SourceType {
        SourceType::Feed
    }
}

#[tokio::test(start_paused = true)]
async fn failing_and_slow_sources_do_not_block_the_rest() {
    let adapters = vec![
        Stub::arc("alpha", Behaviour::Items(2)),
        Stub::arc("broken", Behaviour::Fail),
        Stub::arc("slow", Behaviour::Sleep(Duration::from_secs(60), 3)),
        Stub::arc("omega", Behaviour::Items(1)),
    ];
    let report = fetch_all(&adapters, Duration::from_secs(10)).await;

    let names: Vec<_> = report.items.iter().map(|i| i.source_name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "alpha", "omega"]);
    assert_eq!(report.failed_sources(), 2);
    assert_eq!(report.sources[0].status, SourceStatus::Ok { items: 2 });
    assert!(matches!(report.sources[1].status, SourceStatus::Failed(ref m) if m.contains("503")));
    assert_eq!(report.sources[2].status, SourceStatus::TimedOut);
    assert_eq!(report.sources[3].status, SourceStatus::Ok { items: 1 });
}

#[tokio::test(start_paused = true)]
async fn output_order_ignores_completion_order() {
    let adapters = vec![
        Stub::arc("late", Behaviour::Sleep(Duration::from_secs(3), 1)),
        Stub::arc("early", Behaviour::Sleep(Duration::from_millis(10), 1)),
    ];
    let report = fetch_all(&adapters, Duration::from_secs(10)).await;
    let names: Vec<_> = report.items.iter().map(|i| i.source_name.as_str()).collect();
    assert_eq!(names, vec!["late", "early"]);
    assert_eq!(report.failed_sources(), 0);
}

#[tokio::test]
async fn no_adapters_is_an_empty_report() {
    let report = fetch_all(&[], Duration::from_secs(1)).await;
    assert!(report.items.is_empty());
    assert!(report.sources.is_empty());
}
