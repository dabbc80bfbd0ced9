// src/selection.rs
//! Per-category selection with cross-category exclusivity and per-domain diversity.
//!
//! Categories are processed in display order. Each one takes its best unclaimed eligible
//! items, then hands the grown [`Claims`] to the next category. There is no backtracking:
//! an item placed in an earlier category is never reconsidered, even if it scores higher
//! somewhere later.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::category::Category;
use crate::ingest::types::SourceType;
use crate::scoring::ScoredItem;

/// What to do when a section cannot reach `min_per_section` under the domain cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnderFillPolicy {
    /// Re-run over domain-skipped candidates without the cap, up to the minimum.
    #[default]
    RelaxDiversity,
    /// Never relax; emit the short section.
    KeepShort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionBounds {
    pub min_per_section: usize,
    pub max_per_section: usize,
    pub max_per_domain: usize,
    pub under_fill: UnderFillPolicy,
}

impl Default for SectionBounds {
    fn default() -> Self {
        Self {
            min_per_section: 3,
            max_per_section: 5,
            max_per_domain: 2,
            under_fill: UnderFillPolicy::RelaxDiversity,
        }
    }
}

/// Dedup group ids already placed in some section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims {
    claimed: BTreeSet<String>,
}

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, group_id: &str) -> bool {
        self.claimed.contains(group_id)
    }

    /// Returns false if the group was already claimed.
    pub fn claim(&mut self, group_id: &str) -> bool {
        self.claimed.insert(group_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestEntry {
    pub title: String,
    pub canonical_url: String,
    pub source_name: String,
    pub source_type: SourceType,
    pub domain: String,
    pub published_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub synthetic_timestamp: bool,
    pub group_id: String,
    /// Score in the section's category.
    pub score: f64,
    pub category_scores: BTreeMap<Category, f64>,
    /// Cleaned body, input for the summarizer.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub why_it_matters: String,
}

impl DigestEntry {
    fn from_scored(s: &ScoredItem, c: Category) -> Self {
        Self {
            title: s.item.title.clone(),
            canonical_url: s.item.canonical_url.clone(),
            source_name: s.item.source_name.clone(),
            source_type: s.item.source_type,
            domain: s.item.domain.clone(),
            published_at: s.item.published_at,
            synthetic_timestamp: s.item.synthetic_timestamp,
            group_id: s.group_id.clone(),
            score: s.score(c),
            category_scores: s.category_scores.clone(),
            body: s.item.body.clone(),
            summary: String::new(),
            why_it_matters: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestSection {
    pub category: Category,
    pub label: String,
    pub items: Vec<DigestEntry>,
    /// Fewer than `min_per_section` items.
    pub under_filled: bool,
    /// The under-fill pass added at least one item over the domain cap.
    pub diversity_relaxed: bool,
}

impl DigestSection {
    pub fn empty(category: Category) -> Self {
        Self {
            category,
            label: category.label().to_string(),
            items: Vec::new(),
            under_filled: true,
            diversity_relaxed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Digest {
    pub title: String,
    pub date: NaiveDate,
    /// IANA zone name the run was stamped in.
    pub timezone: String,
    pub generated_at: DateTime<FixedOffset>,
    pub sections: Vec<DigestSection>,
}

impl Digest {
    pub fn title_for(date: NaiveDate) -> String {
        format!("Daily AI Feed - {}", date.format("%Y-%m-%d"))
    }

    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    pub fn entries(&self) -> impl Iterator<Item = &DigestEntry> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    pub fn section(&self, c: Category) -> Option<&DigestSection> {
        self.sections.iter().find(|s| s.category == c)
    }

    /// Same date and the same stories in the same slots. Run time and copy are ignored.
    pub fn same_selection(&self, other: &Digest) -> bool {
        self.date == other.date
            && self.sections.len() == other.sections.len()
            && self.sections.iter().zip(&other.sections).all(|(a, b)| {
                a.category == b.category
                    && a.items
                        .iter()
                        .map(|e| &e.group_id)
                        .eq(b.items.iter().map(|e| &e.group_id))
            })
    }
}

/// Date, zone and `now` of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStamp {
    pub date: NaiveDate,
    pub timezone: String,
    pub generated_at: DateTime<FixedOffset>,
}

/// Eligible, unclaimed candidates for `c`, best first.
///
/// Order: score desc, then earlier `published_at`, then `canonical_url`.
pub fn rank_candidates<'a>(
    items: &'a [ScoredItem],
    c: Category,
    claims: &Claims,
) -> Vec<&'a ScoredItem> {
    let mut cands: Vec<&ScoredItem> = items
        .iter()
        .filter(|s| s.is_eligible(c) && !claims.contains(&s.group_id))
        .collect();
    cands.sort_by(|a, b| {
        b.score(c)
            .total_cmp(&a.score(c))
            .then_with(|| a.item.published_at.cmp(&b.item.published_at))
            .then_with(|| a.item.canonical_url.cmp(&b.item.canonical_url))
    });
    cands
}

/// Fill one section and return it with the claims extended by its picks.
pub fn select_section(
    items: &[ScoredItem],
    c: Category,
    bounds: &SectionBounds,
    mut claims: Claims,
) -> (DigestSection, Claims) {
    let cands = rank_candidates(items, c, &claims);

    let mut picked: Vec<usize> = Vec::new();
    let mut skipped: Vec<usize> = Vec::new();
    let mut per_domain: BTreeMap<&str, usize> = BTreeMap::new();
    let mut in_section: BTreeSet<&str> = BTreeSet::new();

    for (i, s) in cands.iter().enumerate() {
        if picked.len() >= bounds.max_per_section {
            break;
        }
        if !in_section.insert(s.group_id.as_str()) {
            continue;
        }
        let n = per_domain.entry(s.item.domain.as_str()).or_insert(0);
        if *n >= bounds.max_per_domain {
            skipped.push(i);
            continue;
        }
        *n += 1;
        picked.push(i);
    }

    let mut diversity_relaxed = false;
    if picked.len() < bounds.min_per_section && bounds.under_fill == UnderFillPolicy::RelaxDiversity
    {
        for i in skipped {
            if picked.len() >= bounds.min_per_section {
                break;
            }
            picked.push(i);
            diversity_relaxed = true;
        }
        picked.sort_unstable();
    }

    let entries: Vec<DigestEntry> = picked
        .iter()
        .map(|&i| DigestEntry::from_scored(cands[i], c))
        .collect();
    for e in &entries {
        claims.claim(&e.group_id);
    }

    let section = DigestSection {
        category: c,
        label: c.label().to_string(),
        under_filled: entries.len() < bounds.min_per_section,
        diversity_relaxed,
        items: entries,
    };
    (section, claims)
}

/// Build the digest: one section per category in `order`, claims threaded through.
pub fn select(
    items: &[ScoredItem],
    order: &[Category],
    bounds: &SectionBounds,
    stamp: &RunStamp,
) -> Digest {
    let mut claims = Claims::new();
    let mut sections = Vec::with_capacity(order.len());
    for &c in order {
        let (section, next) = select_section(items, c, bounds, claims);
        claims = next;
        sections.push(section);
    }
    Digest {
        title: Digest::title_for(stamp.date),
        date: stamp.date,
        timezone: stamp.timezone.clone(),
        generated_at: stamp.generated_at,
        sections,
    }
}
