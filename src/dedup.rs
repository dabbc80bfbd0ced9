// src/dedup.rs
//! Collapse near-duplicate items into groups with one representative.
//!
//! Two items are linked when they share a canonical URL, or when their normalized titles
//! are near-identical (syndicated reposts under a different URL). Groups are the connected
//! components of that relation, so linking is transitive.
//!
//! Similarity: `strsim::normalized_levenshtein` on normalized titles.

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use strsim::normalized_levenshtein;

use crate::ingest::types::SourceType;
use crate::normalize::NormalizedItem;

#[derive(Debug, Clone, PartialEq)]
pub struct DedupOptions {
    /// Normalized-title similarity in (0, 1] at or above which two items are one story.
    pub title_similarity: f64,
    /// Titles shorter than this (after normalization) only match when equal.
    pub min_fingerprint_chars: usize,
    /// Representative preference, first wins. Unlisted types rank last.
    pub source_priority: Vec<SourceType>,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            title_similarity: 0.92,
            min_fingerprint_chars: 12,
            source_priority: SourceType::default_priority(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupGroup {
    /// First 16 hex chars of SHA-256(representative canonical URL).
    pub id: String,
    /// Carries the union of all members' tags.
    pub representative: NormalizedItem,
    /// All members in input order (representative included).
    pub members: Vec<NormalizedItem>,
}

impl DedupGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

pub fn group_id(canonical_url: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(canonical_url.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Case-folded, punctuation stripped, whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    let folded: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn numeric_tokens(normalized: &str) -> Vec<&str> {
    normalized
        .split(' ')
        .filter(|w| w.chars().any(|c| c.is_ascii_digit()))
        .collect()
}

/// Whether two normalized titles describe the same story.
///
/// Titles differing in any number-bearing token ("gpt 4" vs "gpt 5") never match.
/// A title that normalizes to nothing carries no fingerprint and never matches; such items
/// only link by URL.
pub fn titles_match(a: &str, b: &str, opts: &DedupOptions) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la < opts.min_fingerprint_chars || lb < opts.min_fingerprint_chars {
        return false;
    }
    if numeric_tokens(a) != numeric_tokens(b) {
        return false;
    }
    normalized_levenshtein(a, b) >= opts.title_similarity
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// The smaller index becomes the root, so roots are earliest members.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

fn source_rank(t: SourceType, priority: &[SourceType]) -> usize {
    priority
        .iter()
        .position(|p| *p == t)
        .unwrap_or(priority.len())
}

/// Group `items`. Groups come back in order of their earliest member.
pub fn dedupe(items: &[NormalizedItem], opts: &DedupOptions) -> Vec<DedupGroup> {
    crate::ingest::ensure_metrics_described();
    let n = items.len();
    let mut uf = UnionFind::new(n);

    let mut by_url: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, it) in items.iter().enumerate() {
        match by_url.get(it.canonical_url.as_str()) {
            Some(&first) => uf.union(first, i),
            None => {
                by_url.insert(it.canonical_url.as_str(), i);
            }
        }
    }

    let titles: Vec<String> = items.iter().map(|it| normalize_title(&it.title)).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            if uf.find(i) == uf.find(j) {
                continue;
            }
            if titles_match(&titles[i], &titles[j], opts) {
                uf.union(i, j);
            }
        }
    }

    let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..n {
        let root = uf.find(i);
        components.entry(root).or_default().push(i);
    }

    let groups: Vec<DedupGroup> = components
        .into_values()
        .map(|idxs| build_group(items, &idxs, opts))
        .collect();

    let merged = n - groups.len();
    if merged > 0 {
        counter!("pipeline_dedup_merged_total").increment(merged as u64);
    }
    tracing::debug!(target: "pipeline", items = n, groups = groups.len(), merged, "dedup finished");
    groups
}

fn build_group(items: &[NormalizedItem], idxs: &[usize], opts: &DedupOptions) -> DedupGroup {
    let rep_idx = idxs
        .iter()
        .copied()
        .min_by_key(|&i| {
            let it = &items[i];
            (
                source_rank(it.source_type, &opts.source_priority),
                it.published_at.timestamp_nanos_opt().unwrap_or(i64::MAX),
                Reverse(it.title.chars().count()),
                it.canonical_url.as_str(),
                i,
            )
        })
        .unwrap_or(idxs[0]);

    let mut representative = items[rep_idx].clone();
    for &i in idxs {
        representative.tags.extend(items[i].tags.iter().cloned());
    }

    DedupGroup {
        id: group_id(&representative.canonical_url),
        members: idxs.iter().map(|&i| items[i].clone()).collect(),
        representative,
    }
}
