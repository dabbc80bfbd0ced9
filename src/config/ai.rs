// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

fn default_model() -> String {
    "gpt-5-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_temperature() -> f32 {
    0.2
}
fn default_prompts_dir() -> PathBuf {
    PathBuf::from("prompts/sections")
}
fn default_system_prompt() -> PathBuf {
    PathBuf::from("prompts/system.md")
}

/// `[summarizer]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub enabled: bool,
    /// Only "openai" is supported (case-insensitive).
    pub provider: String,
    /// "ENV" means: read from OPENAI_API_KEY at load time.
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-category guidance, `<slug>.md`.
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: PathBuf,
    #[serde(default = "default_system_prompt")]
    pub system_prompt_path: PathBuf,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "openai".to_string(),
            api_key: "ENV".to_string(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            prompts_dir: default_prompts_dir(),
            system_prompt_path: default_system_prompt(),
        }
    }
}

impl SummarizerConfig {
    /// Resolve `ENV` placeholders and env overrides (OPENAI_MODEL, SECTION_PROMPTS_DIR,
    /// SYSTEM_PROMPT_FILE). A missing key is not an error: the summarizer falls back locally.
    pub fn resolve_env(&mut self) {
        self.provider = self.provider.trim().to_lowercase();

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        }
        if let Ok(m) = env::var("OPENAI_MODEL") {
            if !m.trim().is_empty() {
                self.model = m.trim().to_string();
            }
        }
        if let Ok(p) = env::var("SECTION_PROMPTS_DIR") {
            if !p.trim().is_empty() {
                self.prompts_dir = PathBuf::from(p.trim());
            }
        }
        if let Ok(p) = env::var("SYSTEM_PROMPT_FILE") {
            if !p.trim().is_empty() {
                self.system_prompt_path = PathBuf::from(p.trim());
            }
        }

        // Sanitize
        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
    }

    /// Key usable for requests, if any.
    pub fn api_key(&self) -> Option<&str> {
        let k = self.api_key.trim();
        if k.is_empty() || k.eq_ignore_ascii_case("env") {
            None
        } else {
            Some(k)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn env_placeholder_resolves_from_environment() {
        env::set_var("OPENAI_API_KEY", "sk-test");
        env::set_var("OPENAI_MODEL", "gpt-test");
        let mut c = SummarizerConfig::default();
        c.resolve_env();
        assert_eq!(c.api_key(), Some("sk-test"));
        assert_eq!(c.model, "gpt-test");
        env::remove_var("OPENAI_API_KEY");
        env::remove_var("OPENAI_MODEL");

        let mut c = SummarizerConfig::default();
        c.resolve_env();
        assert_eq!(c.api_key(), None);
    }
}
