// tests/selection_underfill.rs
//
// Sections that cannot reach the minimum under the domain cap.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

use daily_ai_feed::category::Category;
use daily_ai_feed::dedup::group_id;
use daily_ai_feed::ingest::types::SourceType;
use daily_ai_feed::normalize::NormalizedItem;
use daily_ai_feed::scoring::ScoredItem;
use daily_ai_feed::selection::{
    select, select_section, Claims, RunStamp, SectionBounds, UnderFillPolicy,
};

fn now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z").unwrap()
}

fn scored(domain: &str, slug: &str, c: Category, score: f64) -> ScoredItem {
    let url = format!("https://{domain}/{slug}");
    ScoredItem {
        group_id: group_id(&url),
        group_size: 1,
        item: NormalizedItem {
            canonical_url: url,
            domain: domain.into(),
            title: format!("Story {slug}"),
            body: String::new(),
            published_at: now() - Duration::hours(2),
            synthetic_timestamp: false,
            source_name: domain.into(),
            source_type: SourceType::Feed,
            tags: BTreeSet::new(),
        },
        category_scores: BTreeMap::from([(c, score)]),
        eligible: BTreeSet::from([c]),
    }
}

fn one_domain_heavy() -> Vec<ScoredItem> {
    let c = Category::Business;
    vec![
        scored("foo.com", "a", c, 9.0),
        scored("foo.com", "b", c, 8.0),
        scored("foo.com", "c", c, 7.0),
        scored("foo.com", "d", c, 6.0),
    ]
}

fn bounds(policy: UnderFillPolicy) -> SectionBounds {
    SectionBounds {
        min_per_section: 3,
        max_per_section: 5,
        max_per_domain: 2,
        under_fill: policy,
    }
}

#[test]
fn relax_diversity_tops_up_to_the_minimum() {
    let items = one_domain_heavy();
    let (s, _) = select_section(
        &items,
        Category::Business,
        &bounds(UnderFillPolicy::RelaxDiversity),
        Claims::new(),
    );
    let slugs: Vec<_> = s.items.iter().map(|e| e.canonical_url.as_str()).collect();
    assert_eq!(
        slugs,
        vec!["https://foo.com/a", "https://foo.com/b", "https://foo.com/c"]
    );
    assert!(s.diversity_relaxed);
    assert!(!s.under_filled);
}

#[test]
fn keep_short_never_relaxes() {
    let items = one_domain_heavy();
    let (s, claims) = select_section(
        &items,
        Category::Business,
        &bounds(UnderFillPolicy::KeepShort),
        Claims::new(),
    );
    assert_eq!(s.items.len(), 2);
    assert!(s.items.iter().all(|e| e.domain == "foo.com"));
    assert!(s.under_filled);
    assert!(!s.diversity_relaxed);
    assert_eq!(claims.len(), 2);
}

#[test]
fn too_few_candidates_is_flagged_not_fatal() {
    let items = vec![scored("solo.dev", "x", Category::ForFun, 4.0)];
    let stamp = RunStamp {
        date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        timezone: "UTC".into(),
        generated_at: now(),
    };
    let d = select(&items, &Category::ALL, &bounds(UnderFillPolicy::RelaxDiversity), &stamp);
    let fun = d.section(Category::ForFun).unwrap();
    assert_eq!(fun.items.len(), 1);
    assert!(fun.under_filled);
    assert!(!fun.diversity_relaxed);
    assert!(d.sections.iter().all(|s| s.under_filled));
}

#[test]
fn empty_input_gives_empty_well_formed_digest() {
    let stamp = RunStamp {
        date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        timezone: "UTC".into(),
        generated_at: now(),
    };
    let d = select(&[], &Category::ALL, &SectionBounds::default(), &stamp);
    assert_eq!(d.sections.len(), 6);
    assert_eq!(d.item_count(), 0);
    assert!(d.sections.iter().all(|s| s.under_filled && s.items.is_empty()));
    assert_eq!(d.title, "Daily AI Feed - 2026-03-01");
}
