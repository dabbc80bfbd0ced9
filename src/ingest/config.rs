// src/ingest/config.rs
//! Source registry: which adapters to build for a run.
//!
//! Two inputs are merged: a structured file (`[[sources]]` TOML or a JSON array) and an
//! optional markdown registry (`config/feeds.md`) that editors maintain by hand.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::category::Category;
use crate::ingest::providers::{
    arxiv::ArxivAdapter, feed::FeedAdapter, hackernews::HackerNewsAdapter,
    linkedin::LinkedInAdapter, sample::SampleAdapter, x::XSearchAdapter,
};
use crate::ingest::types::{SourceAdapter, SourceType};

pub const ENV_SOURCES_PATH: &str = "DIGEST_SOURCES_PATH";
pub const USER_AGENT: &str = "daily-ai-feed/0.1 (+https://github.com/)";

/// Adapter family named in the registry (`type = "rss"` etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[serde(alias = "feed", alias = "atom")]
    Rss,
    #[serde(alias = "hn")]
    Hackernews,
    Arxiv,
    X,
    Linkedin,
    Sample,
}

impl SourceKind {
    pub fn source_type(self) -> SourceType {
        match self {
            SourceKind::Rss | SourceKind::Sample => SourceType::Feed,
            SourceKind::Hackernews => SourceType::Aggregator,
            SourceKind::Arxiv => SourceType::PaperIndex,
            SourceKind::X => SourceType::SocialSearch,
            SourceKind::Linkedin => SourceType::SocialPosts,
        }
    }
}

/// One configured source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(default)]
    pub url: Option<String>,
    /// arXiv search query or X recent-search query.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub author_urn: Option<String>,
    /// Overrides the adapter's default API endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Editorial hint; becomes a tag equal to the category slug.
    #[serde(default)]
    pub section: Option<Category>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub max_items: Option<usize>,
    /// Hacker News only: keep stories whose title/text contains one of these.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            url: None,
            query: None,
            author_urn: None,
            endpoint: None,
            section: None,
            tags: Vec::new(),
            max_items: None,
            keywords: Vec::new(),
        }
    }

    fn check(&self) -> Result<()> {
        let blank = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or("").is_empty();
        match self.kind {
            SourceKind::Rss if blank(&self.url) => Err(anyhow!("rss source needs `url`")),
            SourceKind::X if blank(&self.query) => Err(anyhow!("x source needs `query`")),
            SourceKind::Linkedin if blank(&self.author_urn) => {
                Err(anyhow!("linkedin source needs `author_urn`"))
            }
            _ => Ok(()),
        }
    }

    /// Identity used when merging registries: kind plus its locator.
    pub fn merge_key(&self) -> (SourceKind, String) {
        let locator = match self.kind {
            SourceKind::Rss => self.url.clone(),
            SourceKind::Arxiv | SourceKind::X => self.query.clone(),
            SourceKind::Linkedin => self.author_urn.clone(),
            SourceKind::Hackernews => self.endpoint.clone().or_else(|| Some("top".into())),
            SourceKind::Sample => Some(String::new()),
        };
        (
            self.kind,
            locator.unwrap_or_default().trim().to_ascii_lowercase(),
        )
    }

    /// Configured tags plus the section slug, without duplicates.
    pub fn effective_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        let hint = self.section.map(|c| c.slug().to_string());
        for t in self.tags.iter().cloned().chain(hint) {
            let t = t.trim().to_string();
            if !t.is_empty() && !tags.contains(&t) {
                tags.push(t);
            }
        }
        tags
    }
}

/// Load sources from an explicit path. Supports TOML (`[[sources]]`) or a JSON array.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Load sources using env var + fallbacks:
/// 1) $DIGEST_SOURCES_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
pub fn load_sources_default() -> Result<Vec<SourceSpec>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("{ENV_SOURCES_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(Vec::new())
}

/// Structured sources (explicit path or defaults) merged with the markdown registry, if present.
pub fn load_sources(explicit: Option<&Path>, feeds_file: Option<&Path>) -> Result<Vec<SourceSpec>> {
    let base = match explicit {
        Some(p) => load_sources_from(p)?,
        None => load_sources_default()?,
    };
    let registry = match feeds_file {
        Some(p) if p.exists() => {
            let md = fs::read_to_string(p)
                .with_context(|| format!("reading feeds registry {}", p.display()))?;
            parse_feeds_registry(&md)
        }
        Some(p) => {
            tracing::debug!(target: "ingest", path = %p.display(), "no feeds registry");
            Vec::new()
        }
        None => Vec::new(),
    };
    Ok(merge_sources(base, registry))
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceSpec>> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    // Surface the real parse error for the hinted format.
    if hint_ext == "toml" {
        parse_toml(s).context("unsupported sources format")
    } else {
        parse_json(s).context("unsupported sources format")
    }
}

fn parse_toml(s: &str) -> Result<Vec<SourceSpec>> {
    #[derive(Deserialize)]
    struct TomlSources {
        #[serde(default)]
        sources: Vec<toml::Value>,
    }
    let v: TomlSources = toml::from_str(s)?;
    let specs = v
        .sources
        .into_iter()
        .filter_map(|raw| match raw.try_into::<SourceSpec>() {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::warn!(target: "ingest", error = %e, "skipping malformed source entry");
                None
            }
        })
        .collect();
    Ok(clean_list(specs))
}

fn parse_json(s: &str) -> Result<Vec<SourceSpec>> {
    let v: Vec<serde_json::Value> = serde_json::from_str(s)?;
    let specs = v
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<SourceSpec>(raw) {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::warn!(target: "ingest", error = %e, "skipping malformed source entry");
                None
            }
        })
        .collect();
    Ok(clean_list(specs))
}

fn clean_list(items: Vec<SourceSpec>) -> Vec<SourceSpec> {
    let mut out: Vec<SourceSpec> = Vec::with_capacity(items.len());
    for mut it in items {
        it.name = it.name.trim().to_string();
        if it.name.is_empty() {
            continue;
        }
        if let Err(e) = it.check() {
            tracing::warn!(target: "ingest", source = %it.name, error = %e, "skipping invalid source");
            continue;
        }
        out.push(it);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegistrySection {
    Urls,
    LinkedIn,
    X,
    Other,
}

fn registry_section(heading: &str) -> RegistrySection {
    let h = heading.trim_start_matches('#').trim().to_ascii_lowercase();
    if h.contains("linkedin") {
        RegistrySection::LinkedIn
    } else if h.contains("x user") || h.ends_with(" x") || h == "x" {
        RegistrySection::X
    } else if h.contains("url") {
        RegistrySection::Urls
    } else {
        RegistrySection::Other
    }
}

/// Parse the hand-maintained markdown registry.
///
/// ```text
/// ## 1. URLs
/// - https://blog.example/feed.xml | name=Example Blog | section=engineering
/// ## 2. LinkedIn users
/// - urn:li:organization:12345 | name=Example Org
/// ## 3. X users
/// - @example_ai
/// ```
pub fn parse_feeds_registry(markdown: &str) -> Vec<SourceSpec> {
    let mut section = RegistrySection::Other;
    let mut out = Vec::new();

    for line in markdown.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            section = registry_section(line);
            continue;
        }
        let Some(entry) = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .map(str::trim)
        else {
            continue;
        };

        let mut parts = entry.split('|').map(str::trim);
        let value = parts.next().unwrap_or_default();
        let mut name: Option<String> = None;
        let mut hint: Option<Category> = None;
        for kv in parts {
            let Some((k, v)) = kv.split_once('=') else {
                continue;
            };
            match k.trim().to_ascii_lowercase().as_str() {
                "name" => name = Some(v.trim().to_string()).filter(|s| !s.is_empty()),
                "section" => {
                    hint = Category::from_slug(v);
                    if hint.is_none() {
                        tracing::warn!(target: "ingest", section = v.trim(), "unknown section hint in registry");
                    }
                }
                _ => {}
            }
        }

        let spec = match section {
            RegistrySection::Urls => {
                let Ok(parsed) = url::Url::parse(value) else {
                    tracing::warn!(target: "ingest", entry = value, "skipping registry url");
                    continue;
                };
                if !matches!(parsed.scheme(), "http" | "https") {
                    continue;
                }
                let mut s = SourceSpec::new(
                    name.unwrap_or_else(|| parsed.host_str().unwrap_or(value).to_string()),
                    SourceKind::Rss,
                );
                s.url = Some(value.to_string());
                s
            }
            RegistrySection::LinkedIn => {
                if !value.starts_with("urn:li:") {
                    tracing::warn!(target: "ingest", entry = value, "skipping linkedin entry without urn");
                    continue;
                }
                let mut s = SourceSpec::new(
                    name.unwrap_or_else(|| format!("LinkedIn {value}")),
                    SourceKind::Linkedin,
                );
                s.author_urn = Some(value.to_string());
                s
            }
            RegistrySection::X => {
                let handle = value.trim_start_matches('@');
                if handle.is_empty()
                    || !handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    tracing::warn!(target: "ingest", entry = value, "skipping x entry");
                    continue;
                }
                let mut s = SourceSpec::new(
                    name.unwrap_or_else(|| format!("X @{handle}")),
                    SourceKind::X,
                );
                s.query = Some(format!("from:{handle} -is:retweet -is:reply lang:en"));
                s
            }
            RegistrySection::Other => continue,
        };
        out.push(SourceSpec {
            section: hint,
            ..spec
        });
    }
    out
}

/// Append `extra` entries whose `(kind, locator)` key is not already present in `base`.
pub fn merge_sources(base: Vec<SourceSpec>, extra: Vec<SourceSpec>) -> Vec<SourceSpec> {
    let mut seen: std::collections::BTreeSet<(SourceKind, String)> =
        base.iter().map(SourceSpec::merge_key).collect();
    let mut out = base;
    for spec in extra {
        if seen.insert(spec.merge_key()) {
            out.push(spec);
        } else {
            tracing::debug!(target: "ingest", source = %spec.name, "registry entry already configured");
        }
    }
    out
}

/// Tokens for the optional social sources. Absent tokens make those adapters return nothing.
#[derive(Debug, Clone, Default)]
pub struct SourceCredentials {
    pub x_bearer_token: Option<String>,
    pub linkedin_access_token: Option<String>,
    pub linkedin_api_version: Option<String>,
}

impl SourceCredentials {
    pub fn from_env() -> Self {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        Self {
            x_bearer_token: var("X_BEARER_TOKEN"),
            linkedin_access_token: var("LINKEDIN_ACCESS_TOKEN"),
            linkedin_api_version: var("LINKEDIN_API_VERSION"),
        }
    }
}

/// Shared HTTP client for all adapters.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("building http client")
}

/// Instantiate one adapter per spec, in spec order.
pub fn build_adapters(
    specs: &[SourceSpec],
    client: &reqwest::Client,
    creds: &SourceCredentials,
) -> Vec<Arc<dyn SourceAdapter>> {
    let mut out: Vec<Arc<dyn SourceAdapter>> = Vec::with_capacity(specs.len());
    for spec in specs {
        let tags = spec.effective_tags();
        let adapter: Arc<dyn SourceAdapter> = match spec.kind {
            SourceKind::Rss => {
                let Some(url) = spec.url.as_deref() else {
                    continue;
                };
                Arc::new(
                    FeedAdapter::from_url(&spec.name, url, client.clone())
                        .with_tags(tags)
                        .with_max_items(spec.max_items.unwrap_or(20)),
                )
            }
            SourceKind::Arxiv => {
                let mut a = ArxivAdapter::new(&spec.name, client.clone())
                    .with_tags(tags)
                    .with_max_items(spec.max_items.unwrap_or(40));
                if let Some(q) = spec.query.as_deref() {
                    a = a.with_query(q);
                }
                if let Some(ep) = spec.endpoint.as_deref() {
                    a = a.with_endpoint(ep);
                }
                Arc::new(a)
            }
            SourceKind::Hackernews => {
                let mut a = HackerNewsAdapter::new(&spec.name, client.clone())
                    .with_tags(tags)
                    .with_keywords(spec.keywords.clone())
                    .with_max_items(spec.max_items.unwrap_or(60));
                if let Some(ep) = spec.endpoint.as_deref() {
                    a = a.with_listing(ep);
                }
                Arc::new(a)
            }
            SourceKind::X => {
                let query = spec.query.clone().unwrap_or_default();
                let mut a = XSearchAdapter::new(&spec.name, query, client.clone())
                    .with_token(creds.x_bearer_token.clone())
                    .with_tags(tags)
                    .with_max_items(spec.max_items.unwrap_or(25));
                if let Some(ep) = spec.endpoint.as_deref() {
                    a = a.with_endpoint(ep);
                }
                Arc::new(a)
            }
            SourceKind::Linkedin => {
                let urn = spec.author_urn.clone().unwrap_or_default();
                let mut a = LinkedInAdapter::new(&spec.name, urn, client.clone())
                    .with_token(creds.linkedin_access_token.clone())
                    .with_tags(tags)
                    .with_max_items(spec.max_items.unwrap_or(20));
                if let Some(v) = creds.linkedin_api_version.as_deref() {
                    a = a.with_api_version(v);
                }
                if let Some(ep) = spec.endpoint.as_deref() {
                    a = a.with_endpoint(ep);
                }
                Arc::new(a)
            }
            SourceKind::Sample => Arc::new(SampleAdapter::new(chrono::Utc::now().fixed_offset())),
        };
        out.push(adapter);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_and_json_formats_work() {
        let toml = r#"
[[sources]]
name = " Example Blog "
type = "rss"
url = "https://blog.example/feed.xml"
section = "engineering"

[[sources]]
name = ""
type = "rss"
url = "https://dropped.example/feed"

[[sources]]
name = "Broken"
type = "rss"
"#;
        let json = r#"[{"name":"HN","type":"hackernews","keywords":["ai"]},{"name":"bad","type":"nope"}]"#;
        let toml_out = parse_toml(toml).unwrap();
        assert_eq!(toml_out.len(), 1);
        assert_eq!(toml_out[0].name, "Example Blog");
        assert_eq!(toml_out[0].section, Some(Category::Engineering));
        let json_out = parse_json(json).unwrap();
        assert_eq!(json_out.len(), 1);
        assert_eq!(json_out[0].kind, SourceKind::Hackernews);
    }

    #[test]
    fn effective_tags_add_section_once() {
        let mut s = SourceSpec::new("a", SourceKind::Rss);
        s.tags = vec!["engineering".into(), " ".into(), "rust".into()];
        s.section = Some(Category::Engineering);
        assert_eq!(s.effective_tags(), vec!["engineering", "rust"]);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_SOURCES_PATH);

        let v = load_sources_default().unwrap();
        assert!(v.is_empty());

        let p_json = tmp.path().join("sources.json");
        fs::write(&p_json, r#"[{"name":"Sample","type":"sample"}]"#).unwrap();
        env::set_var(ENV_SOURCES_PATH, p_json.display().to_string());
        let v2 = load_sources_default().unwrap();
        assert_eq!(v2.len(), 1);
        assert_eq!(v2[0].kind, SourceKind::Sample);

        env::set_var(ENV_SOURCES_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(load_sources_default().is_err());
        env::remove_var(ENV_SOURCES_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
