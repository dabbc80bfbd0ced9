// src/normalize.rs
//! RawItem -> NormalizedItem: canonical URL, zone-correct timestamp, cleaned text.
//!
//! Pure. Every failure is a per-item [`Rejection`]; nothing here can fail a run.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use url::{Position, Url};

use crate::ingest::types::{RawItem, SourceType};
use crate::ingest::{clean_text, BODY_CHAR_CAP};

pub const DEFAULT_MIN_TITLE_CHARS: usize = 8;
const TITLE_CHAR_CAP: usize = 300;
/// Epoch values above this are milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

pub fn default_tracking_params() -> Vec<String> {
    ["utm_*", "ref", "fbclid", "gclid", "mc_cid", "mc_eid"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("empty url")]
    EmptyUrl,
    #[error("unparsable url `{0}`")]
    InvalidUrl(String),
    #[error("unsupported url scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("url has no host")]
    MissingHost,
    #[error("title shorter than {min} chars")]
    TitleTooShort { min: usize },
    #[error("unparsable timestamp `{0}`")]
    Timestamp(String),
}

impl Rejection {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::EmptyUrl => "empty_url",
            Rejection::InvalidUrl(_) => "invalid_url",
            Rejection::UnsupportedScheme(_) => "unsupported_scheme",
            Rejection::MissingHost => "missing_host",
            Rejection::TitleTooShort { .. } => "title_too_short",
            Rejection::Timestamp(_) => "timestamp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub canonical_url: String,
    /// Host of `canonical_url` without a leading `www.`.
    pub domain: String,
    pub title: String,
    pub body: String,
    pub published_at: DateTime<FixedOffset>,
    /// `published_at` is the ingestion time, the source gave none.
    pub synthetic_timestamp: bool,
    pub source_name: String,
    pub source_type: SourceType,
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub tz: Tz,
    pub ingested_at: DateTime<Utc>,
    pub min_title_chars: usize,
    pub tracking_params: Vec<String>,
    pub body_char_cap: usize,
}

impl NormalizeOptions {
    pub fn new(tz: Tz, ingested_at: DateTime<Utc>) -> Self {
        Self {
            tz,
            ingested_at,
            min_title_chars: DEFAULT_MIN_TITLE_CHARS,
            tracking_params: default_tracking_params(),
            body_char_cap: BODY_CHAR_CAP,
        }
    }
}

fn is_tracking_param(key: &str, patterns: &[String]) -> bool {
    let key = key.to_ascii_lowercase();
    patterns.iter().any(|p| {
        let p = p.trim().to_ascii_lowercase();
        match p.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == p,
        }
    })
}

/// Canonical form of `raw` plus its domain.
///
/// Scheme and host are lower-cased and default ports dropped (by `url`), tracking query
/// parameters and the fragment removed, and a single trailing path slash removed.
pub fn canonicalize_url(raw: &str, tracking_params: &[String]) -> Result<(String, String), Rejection> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Rejection::EmptyUrl);
    }
    let mut url = Url::parse(raw).map_err(|_| Rejection::InvalidUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Rejection::UnsupportedScheme(url.scheme().to_string()));
    }
    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
        _ => return Err(Rejection::MissingHost),
    };

    url.set_fragment(None);

    let kept: Vec<String> = url
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|seg| !seg.is_empty())
        .filter(|seg| {
            let key = seg.split('=').next().unwrap_or_default();
            !is_tracking_param(key, tracking_params)
        })
        .map(str::to_string)
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&kept.join("&")));
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(&path[..path.len() - 1]);
    }

    // `url` always serializes an empty path as "/"
    let canonical = if url.path() == "/" && url.query().is_none() {
        url[..Position::BeforePath].to_string()
    } else {
        url.to_string()
    };

    let domain = host.strip_prefix("www.").unwrap_or(&host).to_string();
    Ok((canonical, domain))
}

fn from_offset_datetime(odt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}

/// Parse a source-native timestamp and express it in `tz`.
///
/// Accepts Unix epoch seconds (milliseconds above 10^12), RFC 2822, RFC 3339 / ISO 8601,
/// offset-less ISO date-times and bare dates (both read as UTC).
pub fn parse_timestamp(raw: &str, tz: &Tz) -> Result<DateTime<FixedOffset>, Rejection> {
    let s = raw.trim();
    let bad = || Rejection::Timestamp(s.to_string());
    if s.is_empty() {
        return Err(bad());
    }

    let utc: Option<DateTime<Utc>> = if s.bytes().all(|b| b.is_ascii_digit()) {
        let n: i64 = s.parse().map_err(|_| bad())?;
        if n > EPOCH_MILLIS_THRESHOLD {
            DateTime::from_timestamp_millis(n)
        } else {
            DateTime::from_timestamp(n, 0)
        }
    } else {
        parse_textual(s)
    };

    utc.map(|dt| dt.with_timezone(tz).fixed_offset())
        .ok_or_else(bad)
}

fn parse_textual(s: &str) -> Option<DateTime<Utc>> {
    if let Some(dt) = OffsetDateTime::parse(s, &Rfc2822)
        .ok()
        .and_then(from_offset_datetime)
    {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Normalize one raw item.
pub fn normalize(raw: &RawItem, opts: &NormalizeOptions) -> Result<NormalizedItem, Rejection> {
    let (canonical_url, domain) = canonicalize_url(&raw.url, &opts.tracking_params)?;

    let title = clean_text(&raw.title, TITLE_CHAR_CAP);
    if title.chars().count() < opts.min_title_chars {
        return Err(Rejection::TitleTooShort {
            min: opts.min_title_chars,
        });
    }

    let (published_at, synthetic_timestamp) = match raw
        .published_at
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(ts) => (parse_timestamp(ts, &opts.tz)?, false),
        None => (opts.ingested_at.with_timezone(&opts.tz).fixed_offset(), true),
    };

    let tags = raw
        .tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    Ok(NormalizedItem {
        canonical_url,
        domain,
        title,
        body: clean_text(&raw.body, opts.body_char_cap),
        published_at,
        synthetic_timestamp,
        source_name: raw.source_name.trim().to_string(),
        source_type: raw.source_type,
        tags,
    })
}

/// Normalize a batch. Returns (accepted items in input order, rejected count).
pub fn normalize_all(raws: &[RawItem], opts: &NormalizeOptions) -> (Vec<NormalizedItem>, usize) {
    crate::ingest::ensure_metrics_described();
    let mut out = Vec::with_capacity(raws.len());
    let mut rejected = 0usize;
    for raw in raws {
        match normalize(raw, opts) {
            Ok(item) => out.push(item),
            Err(reason) => {
                rejected += 1;
                counter!("pipeline_rejected_total", "reason" => reason.kind()).increment(1);
                tracing::debug!(
                    target: "pipeline",
                    source = %raw.source_name,
                    url = %raw.url,
                    %reason,
                    "item rejected"
                );
            }
        }
    }
    (out, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_patterns_are_case_insensitive() {
        let p = default_tracking_params();
        assert!(is_tracking_param("UTM_Source", &p));
        assert!(is_tracking_param("ref", &p));
        assert!(!is_tracking_param("referrer", &p));
        assert!(!is_tracking_param("page", &p));
    }

    #[test]
    fn rejection_kinds_are_stable() {
        assert_eq!(Rejection::MissingHost.kind(), "missing_host");
        assert_eq!(Rejection::TitleTooShort { min: 8 }.kind(), "title_too_short");
    }
}
