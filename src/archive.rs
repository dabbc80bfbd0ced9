// src/archive.rs
//! JSON persistence of finished digests.
//!
//! Layout under the root directory:
//! - `latest.json`: the most recently written digest
//! - `archive/<YYYY-MM-DD>.json`: one immutable digest per date
//! - `archive/index.json`: [`IndexEntry`] list, newest date first, one entry per date

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::selection::Digest;

pub const LATEST_FILE: &str = "latest.json";
pub const ARCHIVE_DIR: &str = "archive";
pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub date: NaiveDate,
    pub title: String,
    pub item_count: usize,
    /// Title of the first entry of the first non-empty section.
    #[serde(default)]
    pub lead_story: String,
    #[serde(default)]
    pub lead_url: String,
    pub generated_at: DateTime<FixedOffset>,
}

impl IndexEntry {
    pub fn for_digest(d: &Digest) -> Self {
        let lead = d.sections.iter().find_map(|s| s.items.first());
        Self {
            date: d.date,
            title: d.title.clone(),
            item_count: d.item_count(),
            lead_story: lead.map(|e| e.title.clone()).unwrap_or_default(),
            lead_url: lead.map(|e| e.canonical_url.clone()).unwrap_or_default(),
            generated_at: d.generated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    /// The date already held byte-identical content.
    Unchanged,
    Replaced,
}

#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn date_path(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(ARCHIVE_DIR)
            .join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR).join(INDEX_FILE)
    }

    /// Persist `digest` as the latest snapshot and as its date's archive entry.
    ///
    /// An existing archive file for the date with different content is an error unless
    /// `replace` is set.
    pub fn write(&self, digest: &Digest, replace: bool) -> Result<WriteOutcome> {
        let json = serde_json::to_string_pretty(digest).context("serialize digest")?;
        let dated = self.date_path(digest.date);

        let outcome = match fs::read_to_string(&dated) {
            Ok(existing) if existing == json => WriteOutcome::Unchanged,
            Ok(_) if !replace => bail!(
                "archive for {} already exists at {} (use --force to replace)",
                digest.date,
                dated.display()
            ),
            Ok(_) => WriteOutcome::Replaced,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => WriteOutcome::Created,
            Err(e) => {
                return Err(e).with_context(|| format!("read {}", dated.display()));
            }
        };

        if outcome != WriteOutcome::Unchanged {
            write_atomic(&dated, &json)?;
        }
        write_atomic(&self.root.join(LATEST_FILE), &json)?;

        let mut index = self.list()?;
        index.retain(|e| e.date != digest.date);
        index.push(IndexEntry::for_digest(digest));
        index.sort_by(|a, b| b.date.cmp(&a.date));
        let index_json = serde_json::to_string_pretty(&index).context("serialize archive index")?;
        write_atomic(&self.index_path(), &index_json)?;

        tracing::info!(
            target: "pipeline",
            date = %digest.date,
            items = digest.item_count(),
            outcome = ?outcome,
            root = %self.root.display(),
            "digest archived"
        );
        Ok(outcome)
    }

    pub fn load_latest(&self) -> Result<Option<Digest>> {
        read_json(&self.root.join(LATEST_FILE))
    }

    pub fn load_date(&self, date: NaiveDate) -> Result<Option<Digest>> {
        read_json(&self.date_path(date))
    }

    /// Archive index, newest first. Empty when nothing was written yet.
    pub fn list(&self) -> Result<Vec<IndexEntry>> {
        Ok(read_json(&self.index_path())?.unwrap_or_default())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let s = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    let v = serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(v))
}

/// Write through a sibling temp file and rename over the target.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
    f.write_all(content.as_bytes())
        .with_context(|| format!("write {}", tmp.display()))?;
    f.sync_all()
        .with_context(|| format!("sync {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename onto {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        assert!(store.load_latest().unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn atomic_write_replaces_target_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("latest.json");
        write_atomic(&target, "{\"a\":1}").unwrap();
        write_atomic(&target, "{\"a\":2}").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "{\"a\":2}");
        let names: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["latest.json".to_string()]);
    }

    #[test]
    fn atomic_write_reports_unwritable_target() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the temp file should go
        let target = dir.path().join("x.json");
        fs::create_dir_all(dir.path().join("x.json.tmp")).unwrap();
        assert!(write_atomic(&target, "{}").is_err());
    }

    #[test]
    fn corrupt_index_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(ARCHIVE_DIR)).unwrap();
        fs::write(dir.path().join(ARCHIVE_DIR).join(INDEX_FILE), "{nope").unwrap();
        assert!(ArchiveStore::new(dir.path()).list().is_err());
    }
}
