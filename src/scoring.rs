// src/scoring.rs
//! Per-category relevance scoring.
//!
//! Tables come from the `[scoring]` section of the digest TOML and are compiled once into a
//! [`ScoringEngine`]. Scoring is pure: the same item, tables and `now` always give the same
//! scores.
//!
//! For each category:
//!
//! ```text
//! final = max(0, w.keyword*K + w.affinity*A + w.recency*R - w.penalty*P)   (3 decimals)
//! ```
//!
//! - K: weights of matched keywords, strongest `keyword_cap` only
//! - A: category base + source-type + source-name + domain affinity, tag boost, engagement
//! - R: `recency_max * exp(-age_h / recency_decay_hours)`, same for every category
//! - P: sum of fired penalty rules

use chrono::{DateTime, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::category::Category;
use crate::dedup::DedupGroup;
use crate::ingest::types::SourceType;
use crate::normalize::NormalizedItem;

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("scoring toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown category `{0}` in scoring tables")]
    UnknownCategory(String),
    #[error("unknown source type `{0}` in scoring tables")]
    UnknownSourceType(String),
    #[error("keyword `{keyword}`: {source}")]
    BadRegex {
        keyword: String,
        #[source]
        source: regex::Error,
    },
    #[error("`{field}` must be finite and >= 0, got {value}")]
    InvalidWeight { field: String, value: f64 },
    #[error("`keyword_cap` must be at least 1")]
    ZeroKeywordCap,
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub keyword: f64,
    pub affinity: f64,
    pub recency: f64,
    pub penalty: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            keyword: 1.0,
            affinity: 1.0,
            recency: 1.0,
            penalty: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryTable {
    /// Constant bias for every item.
    pub base: f64,
    /// Keyword or phrase -> weight. A `re:` prefix marks a raw regex.
    pub keywords: BTreeMap<String, f64>,
    /// Domain -> affinity; also matches subdomains.
    pub domains: BTreeMap<String, f64>,
    /// Engagement points (`hn-points:<n>`, `x-likes:<n>` tags) per affinity unit.
    pub points_per_unit: Option<f64>,
    /// Upper bound of the engagement bonus.
    pub points_cap: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PenaltyRule {
    pub category: String,
    pub amount: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub unless_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub min_score: f64,
    pub keyword_cap: usize,
    pub recency_max: f64,
    pub recency_decay_hours: f64,
    pub synthetic_recency: f64,
    /// Added when the item's tags contain the category slug.
    pub tag_boost: f64,
    pub weights: SignalWeights,
    pub categories: BTreeMap<String, CategoryTable>,
    /// source type -> category -> affinity
    pub type_affinity: BTreeMap<String, BTreeMap<String, f64>>,
    /// source name -> category -> affinity
    pub source_affinity: BTreeMap<String, BTreeMap<String, f64>>,
    pub penalties: Vec<PenaltyRule>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_score: 1.0,
            keyword_cap: 3,
            recency_max: 4.0,
            recency_decay_hours: 24.0,
            synthetic_recency: 0.8,
            tag_boost: 4.5,
            weights: SignalWeights::default(),
            categories: BTreeMap::new(),
            type_affinity: BTreeMap::new(),
            source_affinity: BTreeMap::new(),
            penalties: Vec::new(),
        }
    }
}

/* ----------------------------
Compiled engine structures
---------------------------- */

#[derive(Debug)]
struct CompiledKeyword {
    text: String,
    weight: f64,
    re: Regex,
}

#[derive(Debug, Default)]
struct CompiledCategory {
    base: f64,
    keywords: Vec<CompiledKeyword>,
    domains: BTreeMap<String, f64>,
    points_per_unit: Option<f64>,
    points_cap: f64,
}

#[derive(Debug)]
struct CompiledPenalty {
    category: Category,
    amount: f64,
    keywords: Vec<Regex>,
    domains: Vec<String>,
    unless: Vec<Regex>,
}

/// Per-category signal values before weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SignalBreakdown {
    pub keyword: f64,
    pub affinity: f64,
    pub recency: f64,
    pub penalty: f64,
}

/// A representative with its scores. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub group_id: String,
    pub group_size: usize,
    pub item: NormalizedItem,
    pub category_scores: BTreeMap<Category, f64>,
    /// Categories where the score reached `min_score`.
    pub eligible: BTreeSet<Category>,
}

impl ScoredItem {
    pub fn score(&self, c: Category) -> f64 {
        self.category_scores.get(&c).copied().unwrap_or(0.0)
    }

    pub fn is_eligible(&self, c: Category) -> bool {
        self.eligible.contains(&c)
    }
}

/// Compiled scoring tables. Read-only after construction.
#[derive(Debug)]
pub struct ScoringEngine {
    cfg: ScoringConfig,
    categories: BTreeMap<Category, CompiledCategory>,
    type_affinity: BTreeMap<SourceType, BTreeMap<Category, f64>>,
    source_affinity: BTreeMap<String, BTreeMap<Category, f64>>,
    penalties: Vec<CompiledPenalty>,
}

fn check_weight(field: impl Into<String>, value: f64) -> Result<f64, ScoringError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ScoringError::InvalidWeight {
            field: field.into(),
            value,
        })
    }
}

fn category(slug: &str) -> Result<Category, ScoringError> {
    Category::from_slug(slug).ok_or_else(|| ScoringError::UnknownCategory(slug.to_string()))
}

/// Case-insensitive, word-bounded matcher for a keyword (or a raw `re:` pattern).
pub fn keyword_regex(keyword: &str) -> Result<Regex, ScoringError> {
    let pattern = match keyword.strip_prefix("re:") {
        Some(raw) => format!("(?i){raw}"),
        None => {
            let kw = keyword.trim();
            let word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
            let lead = if word(kw.chars().next()) { r"\b" } else { "" };
            let trail = if word(kw.chars().last()) { r"\b" } else { "" };
            format!("(?i){lead}{}{trail}", regex::escape(kw))
        }
    };
    Regex::new(&pattern).map_err(|source| ScoringError::BadRegex {
        keyword: keyword.to_string(),
        source,
    })
}

fn domain_matches(domain: &str, pattern: &str) -> bool {
    let p = pattern.trim().trim_start_matches("www.").to_ascii_lowercase();
    domain == p || domain.ends_with(&format!(".{p}"))
}

fn category_map(
    raw: &BTreeMap<String, f64>,
    field: &str,
) -> Result<BTreeMap<Category, f64>, ScoringError> {
    raw.iter()
        .map(|(slug, w)| Ok((category(slug)?, check_weight(format!("{field}.{slug}"), *w)?)))
        .collect()
}

/// Engagement points carried as `hn-points:<n>` / `x-likes:<n>` tags.
fn engagement_points(item: &NormalizedItem) -> f64 {
    item.tags
        .iter()
        .filter_map(|t| {
            t.strip_prefix("hn-points:")
                .or_else(|| t.strip_prefix("x-likes:"))
                .and_then(|n| n.parse::<f64>().ok())
        })
        .fold(0.0, f64::max)
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

impl ScoringEngine {
    /// Parse a TOML document whose root is the scoring table (no `[scoring]` header).
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ScoringError> {
        let cfg: ScoringConfig = toml::from_str(toml_str)?;
        Self::new(cfg)
    }

    pub fn new(cfg: ScoringConfig) -> Result<Self, ScoringError> {
        if cfg.keyword_cap == 0 {
            return Err(ScoringError::ZeroKeywordCap);
        }
        check_weight("min_score", cfg.min_score)?;
        check_weight("recency_max", cfg.recency_max)?;
        check_weight("synthetic_recency", cfg.synthetic_recency)?;
        check_weight("tag_boost", cfg.tag_boost)?;
        if !(cfg.recency_decay_hours.is_finite() && cfg.recency_decay_hours > 0.0) {
            return Err(ScoringError::InvalidWeight {
                field: "recency_decay_hours".into(),
                value: cfg.recency_decay_hours,
            });
        }
        let w = &cfg.weights;
        check_weight("weights.keyword", w.keyword)?;
        check_weight("weights.affinity", w.affinity)?;
        check_weight("weights.recency", w.recency)?;
        check_weight("weights.penalty", w.penalty)?;

        let mut categories: BTreeMap<Category, CompiledCategory> =
            Category::ALL.iter().map(|c| (*c, CompiledCategory::default())).collect();
        for (slug, table) in &cfg.categories {
            let c = category(slug)?;
            // base may be negative: it is a bias, not a weight
            if !table.base.is_finite() {
                return Err(ScoringError::InvalidWeight {
                    field: format!("categories.{slug}.base"),
                    value: table.base,
                });
            }
            let keywords = table
                .keywords
                .iter()
                .map(|(kw, weight)| {
                    Ok(CompiledKeyword {
                        text: kw.clone(),
                        weight: check_weight(format!("categories.{slug}.keywords.{kw}"), *weight)?,
                        re: keyword_regex(kw)?,
                    })
                })
                .collect::<Result<Vec<_>, ScoringError>>()?;
            let domains = table
                .domains
                .iter()
                .map(|(d, w)| {
                    Ok((
                        d.trim().to_ascii_lowercase(),
                        check_weight(format!("categories.{slug}.domains.{d}"), *w)?,
                    ))
                })
                .collect::<Result<BTreeMap<_, _>, ScoringError>>()?;
            if let Some(ppu) = table.points_per_unit {
                if !(ppu.is_finite() && ppu > 0.0) {
                    return Err(ScoringError::InvalidWeight {
                        field: format!("categories.{slug}.points_per_unit"),
                        value: ppu,
                    });
                }
            }
            categories.insert(
                c,
                CompiledCategory {
                    base: table.base,
                    keywords,
                    domains,
                    points_per_unit: table.points_per_unit,
                    points_cap: check_weight(format!("categories.{slug}.points_cap"), table.points_cap)?,
                },
            );
        }

        let mut type_affinity = BTreeMap::new();
        for (ty, per_cat) in &cfg.type_affinity {
            let st = SourceType::from_str(ty)
                .map_err(|_| ScoringError::UnknownSourceType(ty.clone()))?;
            type_affinity.insert(st, category_map(per_cat, &format!("type_affinity.{ty}"))?);
        }

        let mut source_affinity = BTreeMap::new();
        for (name, per_cat) in &cfg.source_affinity {
            source_affinity.insert(
                name.trim().to_lowercase(),
                category_map(per_cat, &format!("source_affinity.{name}"))?,
            );
        }

        let penalties = cfg
            .penalties
            .iter()
            .map(|p| {
                Ok(CompiledPenalty {
                    category: category(&p.category)?,
                    amount: check_weight(format!("penalties.{}.amount", p.category), p.amount)?,
                    keywords: p
                        .keywords
                        .iter()
                        .map(|k| keyword_regex(k))
                        .collect::<Result<_, _>>()?,
                    domains: p.domains.iter().map(|d| d.trim().to_ascii_lowercase()).collect(),
                    unless: p
                        .unless_keywords
                        .iter()
                        .map(|k| keyword_regex(k))
                        .collect::<Result<_, _>>()?,
                })
            })
            .collect::<Result<Vec<_>, ScoringError>>()?;

        Ok(Self {
            cfg,
            categories,
            type_affinity,
            source_affinity,
            penalties,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.cfg
    }

    pub fn min_score(&self) -> f64 {
        self.cfg.min_score
    }

    /// Shared recency signal.
    pub fn recency<Z: TimeZone>(&self, item: &NormalizedItem, now: &DateTime<Z>) -> f64 {
        if item.synthetic_timestamp {
            return self.cfg.synthetic_recency;
        }
        let age_ms = now
            .clone()
            .fixed_offset()
            .signed_duration_since(item.published_at)
            .num_milliseconds()
            .max(0);
        let age_h = age_ms as f64 / 3_600_000.0;
        self.cfg.recency_max * (-age_h / self.cfg.recency_decay_hours).exp()
    }

    /// Matched keywords for `c`, strongest first, capped at `keyword_cap`.
    pub fn keyword_hits(&self, c: Category, text: &str) -> Vec<(&str, f64)> {
        let Some(cat) = self.categories.get(&c) else {
            return Vec::new();
        };
        let mut hits: Vec<(&str, f64)> = cat
            .keywords
            .iter()
            .filter(|k| k.re.is_match(text))
            .map(|k| (k.text.as_str(), k.weight))
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        hits.truncate(self.cfg.keyword_cap);
        hits
    }

    fn affinity(&self, c: Category, item: &NormalizedItem) -> f64 {
        let Some(cat) = self.categories.get(&c) else {
            return 0.0;
        };
        let mut a = cat.base;
        a += self
            .type_affinity
            .get(&item.source_type)
            .and_then(|m| m.get(&c))
            .copied()
            .unwrap_or(0.0);
        a += self
            .source_affinity
            .get(&item.source_name.trim().to_lowercase())
            .and_then(|m| m.get(&c))
            .copied()
            .unwrap_or(0.0);
        a += cat
            .domains
            .iter()
            .filter(|(d, _)| domain_matches(&item.domain, d))
            .map(|(_, w)| *w)
            .fold(0.0, f64::max);
        if item.tags.contains(c.slug()) {
            a += self.cfg.tag_boost;
        }
        if let Some(ppu) = cat.points_per_unit {
            a += (engagement_points(item) / ppu).min(cat.points_cap);
        }
        a
    }

    fn penalty(&self, c: Category, item: &NormalizedItem, text: &str) -> f64 {
        self.penalties
            .iter()
            .filter(|p| p.category == c)
            .filter(|p| {
                let hit = p.keywords.iter().any(|re| re.is_match(text))
                    || p.domains.iter().any(|d| domain_matches(&item.domain, d));
                hit && !p.unless.iter().any(|re| re.is_match(text))
            })
            .map(|p| p.amount)
            .sum()
    }

    /// Raw signals per category (debugging and tests).
    pub fn explain<Z: TimeZone>(
        &self,
        item: &NormalizedItem,
        now: &DateTime<Z>,
    ) -> BTreeMap<Category, SignalBreakdown> {
        let text = format!("{} {}", item.title, item.body);
        let recency = self.recency(item, now);
        Category::ALL
            .iter()
            .map(|&c| {
                let keyword = self.keyword_hits(c, &text).iter().map(|(_, w)| w).sum();
                (
                    c,
                    SignalBreakdown {
                        keyword,
                        affinity: self.affinity(c, item),
                        recency,
                        penalty: self.penalty(c, item, &text),
                    },
                )
            })
            .collect()
    }

    /// Score vector over all six categories.
    pub fn score<Z: TimeZone>(
        &self,
        item: &NormalizedItem,
        now: &DateTime<Z>,
    ) -> BTreeMap<Category, f64> {
        let w = &self.cfg.weights;
        self.explain(item, now)
            .into_iter()
            .map(|(c, s)| {
                let raw = w.keyword * s.keyword + w.affinity * s.affinity + w.recency * s.recency
                    - w.penalty * s.penalty;
                let v = round3(raw);
                (c, if v > 0.0 { v } else { 0.0 })
            })
            .collect()
    }

    /// Score a group representative.
    pub fn score_group<Z: TimeZone>(&self, group: &DedupGroup, now: &DateTime<Z>) -> ScoredItem {
        let category_scores = self.score(&group.representative, now);
        let eligible = category_scores
            .iter()
            .filter(|(_, s)| **s >= self.cfg.min_score)
            .map(|(c, _)| *c)
            .collect();
        ScoredItem {
            group_id: group.id.clone(),
            group_size: group.len(),
            item: group.representative.clone(),
            category_scores,
            eligible,
        }
    }

    pub fn score_all<Z: TimeZone>(&self, groups: &[DedupGroup], now: &DateTime<Z>) -> Vec<ScoredItem> {
        groups.iter().map(|g| self.score_group(g, now)).collect()
    }
}
