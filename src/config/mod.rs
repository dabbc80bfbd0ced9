// src/config/mod.rs
//! Digest configuration: one TOML document with `[run]`, `[dedup]`, `[normalize]`,
//! `[scoring]` and `[summarizer]` sections. Every field has a default.
//!
//! Resolution: `$DIGEST_CONFIG_PATH`, else `config/digest.toml`, else the built-in copy of
//! that file. Env overrides (`FEED_TIMEZONE`, `DIGEST_WINDOW_HOURS`) apply on top.
//! Configuration defects are fatal and surface before any ingestion.

pub mod ai;
pub mod run;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dedup::DedupOptions;
use crate::ingest::types::SourceType;
use crate::ingest::BODY_CHAR_CAP;
use crate::normalize::{default_tracking_params, NormalizeOptions, DEFAULT_MIN_TITLE_CHARS};
use crate::scoring::{ScoringConfig, ScoringEngine, ScoringError};

pub use ai::SummarizerConfig;
pub use run::RunConfig;

pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";
pub const ENV_TIMEZONE: &str = "FEED_TIMEZONE";
pub const ENV_WINDOW_HOURS: &str = "DIGEST_WINDOW_HOURS";

const BUILTIN_CONFIG: &str = include_str!("../../config/digest.toml");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("unknown time zone `{0}`")]
    Timezone(String),
    #[error("scoring tables: {0}")]
    Scoring(#[from] ScoringError),
}

/// `[dedup]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub title_similarity: f64,
    pub min_fingerprint_chars: usize,
    /// Source types, highest priority first.
    pub source_priority: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        let d = DedupOptions::default();
        Self {
            title_similarity: d.title_similarity,
            min_fingerprint_chars: d.min_fingerprint_chars,
            source_priority: d
                .source_priority
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
        }
    }
}

impl DedupConfig {
    pub fn options(&self) -> Result<DedupOptions, ConfigError> {
        let source_priority = self
            .source_priority
            .iter()
            .map(|s| {
                SourceType::from_str(s)
                    .map_err(|_| ConfigError::Invalid(format!("dedup.source_priority: unknown `{s}`")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DedupOptions {
            title_similarity: self.title_similarity,
            min_fingerprint_chars: self.min_fingerprint_chars,
            source_priority,
        })
    }
}

/// `[normalize]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub min_title_chars: usize,
    /// Query keys to strip; `prefix*` patterns allowed, case-insensitive.
    pub tracking_params: Vec<String>,
    pub body_char_cap: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            min_title_chars: DEFAULT_MIN_TITLE_CHARS,
            tracking_params: default_tracking_params(),
            body_char_cap: BODY_CHAR_CAP,
        }
    }
}

impl NormalizeConfig {
    pub fn options(&self, tz: Tz, ingested_at: DateTime<Utc>) -> NormalizeOptions {
        NormalizeOptions {
            tz,
            ingested_at,
            min_title_chars: self.min_title_chars,
            tracking_params: self.tracking_params.clone(),
            body_char_cap: self.body_char_cap,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub run: RunConfig,
    pub dedup: DedupConfig,
    pub normalize: NormalizeConfig,
    pub scoring: ScoringConfig,
    pub summarizer: SummarizerConfig,
}

impl DigestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Self::parse(s, "<inline>")
    }

    fn parse(s: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// The configuration shipped with the crate (`config/digest.toml`).
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::parse(BUILTIN_CONFIG, "<builtin>")
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Resolve the file (explicit path, `$DIGEST_CONFIG_PATH`, default path, built-in),
    /// then apply env overrides and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match explicit {
            Some(p) => Self::load_from(p)?,
            None => Self::load_default()?,
        };
        cfg.apply_env_overrides()?;
        cfg.summarizer.resolve_env();
        cfg.validate()?;
        Ok(cfg)
    }

    fn load_default() -> Result<Self, ConfigError> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load_from(Path::new(&p));
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        tracing::debug!("no config file found, using built-in configuration");
        Self::builtin()
    }

    /// `FEED_TIMEZONE` and `DIGEST_WINDOW_HOURS` override the file.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(tz) = std::env::var(ENV_TIMEZONE) {
            if !tz.trim().is_empty() {
                self.run.timezone = tz.trim().to_string();
            }
        }
        if let Ok(raw) = std::env::var(ENV_WINDOW_HOURS) {
            let h = raw.trim().parse::<u32>().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_WINDOW_HOURS} is not a number: `{raw}`"))
            })?;
            self.run.window_hours = h;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run.validate()?;
        let sim = self.dedup.title_similarity;
        if !(sim > 0.0 && sim <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "dedup.title_similarity must be in (0, 1], got {sim}"
            )));
        }
        self.dedup.options()?;
        if self.normalize.body_char_cap == 0 {
            return Err(ConfigError::Invalid("normalize.body_char_cap must be > 0".into()));
        }
        self.scoring_engine()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.run.tz()
    }

    pub fn scoring_engine(&self) -> Result<ScoringEngine, ConfigError> {
        Ok(ScoringEngine::new(self.scoring.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn builtin_config_is_valid() {
        let cfg = DigestConfig::builtin().unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.run.window_hours, 24);
        assert!(!cfg.scoring.categories.is_empty());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = DigestConfig::from_toml_str("[run]\nmax_per_section = 4\n").unwrap();
        assert_eq!(cfg.run.max_per_section, 4);
        assert_eq!(cfg.run.min_per_section, 3);
        assert_eq!(cfg.dedup.title_similarity, 0.92);
    }

    #[test]
    fn min_above_max_is_fatal() {
        let cfg =
            DigestConfig::from_toml_str("[run]\nmin_per_section = 6\nmax_per_section = 5\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn scoring_defects_surface_in_validate() {
        let cfg = DigestConfig::from_toml_str("[scoring.categories.sports]\nbase = 1.0\n").unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Scoring(_))));
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_apply() {
        env::set_var(ENV_TIMEZONE, "Europe/Prague");
        env::set_var(ENV_WINDOW_HOURS, "48");
        let mut cfg = DigestConfig::default();
        cfg.apply_env_overrides().unwrap();
        assert_eq!(cfg.run.timezone, "Europe/Prague");
        assert_eq!(cfg.run.window_hours, 48);

        env::set_var(ENV_WINDOW_HOURS, "two days");
        assert!(cfg.apply_env_overrides().is_err());
        env::remove_var(ENV_TIMEZONE);
        env::remove_var(ENV_WINDOW_HOURS);
    }
}
