// src/window.rs
//! Recency window: keep groups published within `[now - window_hours, now]`.

use chrono::{DateTime, Duration, TimeZone};
use metrics::counter;

use crate::dedup::DedupGroup;

/// Whether `published_at` lies inside the window ending at `now` (both edges inclusive).
///
/// Compares absolute instants, so the zones of the two arguments are irrelevant.
pub fn in_window<A: TimeZone, B: TimeZone>(
    published_at: &DateTime<A>,
    now: &DateTime<B>,
    window_hours: u32,
) -> bool {
    let lower = now.clone() - Duration::hours(i64::from(window_hours));
    *published_at >= lower && *published_at <= *now
}

/// Keep groups whose representative is in the window. Order is preserved.
pub fn filter<Z: TimeZone>(
    groups: Vec<DedupGroup>,
    now: &DateTime<Z>,
    window_hours: u32,
) -> Vec<DedupGroup> {
    crate::ingest::ensure_metrics_described();
    let total = groups.len();
    let mut future = 0usize;
    let kept: Vec<DedupGroup> = groups
        .into_iter()
        .filter(|g| {
            let ts = &g.representative.published_at;
            if *ts > *now {
                future += 1;
            }
            in_window(ts, now, window_hours)
        })
        .collect();

    let dropped = total - kept.len();
    if dropped > 0 {
        counter!("pipeline_window_dropped_total", "reason" => "future").increment(future as u64);
        counter!("pipeline_window_dropped_total", "reason" => "stale")
            .increment((dropped - future) as u64);
        tracing::debug!(
            target: "pipeline",
            stale = dropped - future,
            future,
            window_hours,
            "window dropped groups"
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn zones_do_not_matter() {
        let now = DateTime::parse_from_rfc3339("2026-03-01T12:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        // 20:00 in Tokyo is 11:00 UTC
        let ts = tokyo.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        assert!(in_window(&ts, &now, 24));
        let future = tokyo.with_ymd_and_hms(2026, 3, 1, 21, 0, 1).unwrap();
        assert!(!in_window(&future, &now, 24));
    }
}
