// src/config/run.rs
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ConfigError;
use crate::selection::{SectionBounds, UnderFillPolicy};

pub const DEFAULT_TIMEZONE: &str = "America/New_York";
pub const MAX_WINDOW_HOURS: u32 = 336;

/// `[run]`: plain values consumed by the window filter and the selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// IANA zone the digest date and timestamps are expressed in.
    pub timezone: String,
    pub window_hours: u32,
    pub min_per_section: usize,
    pub max_per_section: usize,
    pub max_per_domain: usize,
    pub under_fill: UnderFillPolicy,
    /// Per-source fetch timeout.
    pub fetch_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            window_hours: 24,
            min_per_section: 3,
            max_per_section: 5,
            max_per_domain: 2,
            under_fill: UnderFillPolicy::RelaxDiversity,
            fetch_timeout_secs: 20,
        }
    }
}

impl RunConfig {
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| ConfigError::Timezone(self.timezone.clone()))
    }

    pub fn bounds(&self) -> SectionBounds {
        SectionBounds {
            min_per_section: self.min_per_section,
            max_per_section: self.max_per_section,
            max_per_domain: self.max_per_domain,
            under_fill: self.under_fill,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        if !(1..=MAX_WINDOW_HOURS).contains(&self.window_hours) {
            return Err(ConfigError::Invalid(format!(
                "run.window_hours must be in 1..={MAX_WINDOW_HOURS}, got {}",
                self.window_hours
            )));
        }
        if self.max_per_section < 1 {
            return Err(ConfigError::Invalid("run.max_per_section must be >= 1".into()));
        }
        if self.min_per_section > self.max_per_section {
            return Err(ConfigError::Invalid(format!(
                "run.min_per_section ({}) exceeds run.max_per_section ({})",
                self.min_per_section, self.max_per_section
            )));
        }
        if self.max_per_domain < 1 {
            return Err(ConfigError::Invalid("run.max_per_domain must be >= 1".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("run.fetch_timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}
