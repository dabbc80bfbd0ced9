// src/summarizer.rs
//! Summaries and "why it matters" lines for selected entries.
//!
//! [`enrich_digest`] is total: whatever the [`Summarizer`] does, every entry leaves with
//! non-empty copy. Entries the summarizer could not handle get [`fallback_copy`], built only
//! from the entry's own title, body and source.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::category::Category;
use crate::config::SummarizerConfig;
use crate::ingest::config::USER_AGENT;
use crate::selection::{Digest, DigestEntry};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You write concise AI-news briefings. Return strict JSON only, no markdown.";

pub const SUMMARY_MAX_CHARS: usize = 260;
pub const WHY_MAX_CHARS: usize = 180;
pub const FALLBACK_SUMMARY_MAX_CHARS: usize = 220;
pub const FALLBACK_WHY_MAX_CHARS: usize = 160;
const SUMMARY_INPUT_MAX_CHARS: usize = 360;

/// Produces `(summary, why_it_matters)` for digest entries.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Summarize one entry placed in `category`, under that section's guidance text.
    async fn summarize(
        &self,
        category: Category,
        entry: &DigestEntry,
        guidance: &str,
    ) -> Result<(String, String)>;

    /// Summarize a whole section. Slot `i` belongs to `entries[i]`; `None` means "use the
    /// fallback". The default asks [`Summarizer::summarize`] once per entry.
    async fn summarize_section(
        &self,
        category: Category,
        entries: &[DigestEntry],
        guidance: &str,
    ) -> Vec<Option<(String, String)>> {
        let mut out = Vec::with_capacity(entries.len());
        for e in entries {
            match self.summarize(category, e, guidance).await {
                Ok(pair) => out.push(Some(pair)),
                Err(err) => {
                    tracing::debug!(
                        target: "summarizer",
                        provider = self.name(),
                        section = category.slug(),
                        url = %e.canonical_url,
                        error = %err,
                        "entry not summarized"
                    );
                    out.push(None);
                }
            }
        }
        out
    }
}

/// Always fails; every entry ends up with the local fallback.
pub struct DisabledSummarizer;

#[async_trait]
impl Summarizer for DisabledSummarizer {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn summarize(
        &self,
        _category: Category,
        _entry: &DigestEntry,
        _guidance: &str,
    ) -> Result<(String, String)> {
        bail!("summarizer disabled")
    }

    async fn summarize_section(
        &self,
        _category: Category,
        entries: &[DigestEntry],
        _guidance: &str,
    ) -> Vec<Option<(String, String)>> {
        vec![None; entries.len()]
    }
}

/// Collapse whitespace and cap at `max_chars`.
///
/// Long text is cut at the last period of the first `max_chars - 1` chars when that period
/// sits past char 80; otherwise the cut text gets a `...` suffix.
pub fn safe_sentence(text: &str, max_chars: usize) -> String {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }
    let truncated: String = cleaned.chars().take(max_chars.saturating_sub(1)).collect();
    match truncated.char_indices().filter(|(_, c)| *c == '.').last() {
        Some((at, _)) if truncated[..at].chars().count() > 80 => truncated[..=at].to_string(),
        _ => format!("{truncated}..."),
    }
}

/// Deterministic local copy from the entry's own fields.
pub fn fallback_copy(entry: &DigestEntry, category: Category) -> (String, String) {
    let source_text = if entry.body.trim().is_empty() {
        entry.title.as_str()
    } else {
        entry.body.as_str()
    };
    let summary = safe_sentence(source_text, FALLBACK_SUMMARY_MAX_CHARS);
    let why = safe_sentence(
        &format!(
            "This matters for {}, based on this update from {}.",
            category.lens(),
            entry.source_name
        ),
        FALLBACK_WHY_MAX_CHARS,
    );
    (summary, why)
}

/// `<dir>/<slug>.md`, or `Focus lens: <lens>.` when the file is missing or blank.
pub fn load_guidance(prompts_dir: &Path, category: Category) -> String {
    let default = format!("Focus lens: {}.", category.lens());
    let path = prompts_dir.join(format!("{}.md", category.slug()));
    match std::fs::read_to_string(&path) {
        Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
        Ok(_) => default,
        Err(e) => {
            tracing::warn!(
                target: "summarizer",
                section = category.slug(),
                path = %path.display(),
                error = %e,
                "section guidance missing"
            );
            default
        }
    }
}

fn load_system_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
        Ok(_) => DEFAULT_SYSTEM_PROMPT.to_string(),
        Err(e) => {
            tracing::debug!(target: "summarizer", path = %path.display(), error = %e, "using default system prompt");
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

#[derive(Debug, Serialize)]
struct PayloadItem<'a> {
    id: &'a str,
    title: &'a str,
    source: &'a str,
    url: &'a str,
    summary_input: String,
}

fn build_user_prompt(category: Category, guidance: &str, entries: &[DigestEntry]) -> Result<String> {
    let payload: Vec<PayloadItem<'_>> = entries
        .iter()
        .map(|e| PayloadItem {
            id: &e.group_id,
            title: &e.title,
            source: &e.source_name,
            url: &e.canonical_url,
            summary_input: safe_sentence(&e.body, SUMMARY_INPUT_MAX_CHARS),
        })
        .collect();
    let json = serde_json::to_string(&payload).context("encode summarizer payload")?;
    Ok(format!(
        "Section: {slug}\n\
         Section guidance markdown:\n\
         {guidance}\n\n\
         For each item, create:\n\
         1) \"summary\" = <= 45 words, factual.\n\
         2) \"why_it_matters\" = <= 28 words, actionable.\n\
         Focus lens: {lens}.\n\
         Input JSON:\n\
         {json}\n\n\
         Return JSON object with exact shape:\n\
         {{\"items\":[{{\"id\":\"...\",\"summary\":\"...\",\"why_it_matters\":\"...\"}}]}}",
        slug = category.slug(),
        lens = category.lens(),
    ))
}

#[derive(Debug, Deserialize)]
struct EnrichmentRows {
    #[serde(default)]
    items: Vec<EnrichmentRow>,
}

#[derive(Debug, Deserialize)]
struct EnrichmentRow {
    #[serde(default)]
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    why_it_matters: String,
}

/// Parse the model's `{"items":[{id, summary, why_it_matters}]}` reply.
///
/// Rows without an id or with an empty field are dropped, so their entries fall back.
pub fn parse_enrichment(content: &str) -> Result<BTreeMap<String, (String, String)>> {
    let rows: EnrichmentRows =
        serde_json::from_str(content.trim()).context("summarizer reply is not the expected JSON")?;
    let mut out = BTreeMap::new();
    for row in rows.items {
        let id = row.id.trim();
        let summary = safe_sentence(&row.summary, SUMMARY_MAX_CHARS);
        let why = safe_sentence(&row.why_it_matters, WHY_MAX_CHARS);
        if id.is_empty() || summary.is_empty() || why.is_empty() {
            continue;
        }
        out.insert(id.to_string(), (summary, why));
    }
    Ok(out)
}

/// OpenAI chat-completions client. One request per section.
pub struct OpenAiSummarizer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
    system_prompt: String,
}

impl OpenAiSummarizer {
    pub fn new(cfg: &SummarizerConfig) -> Result<Self> {
        let api_key = cfg
            .api_key()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY not set"))?
            .to_string();
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build summarizer http client")?;
        Ok(Self {
            http,
            api_key,
            model: cfg.model.clone(),
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            temperature: cfg.temperature,
            system_prompt: load_system_prompt(&cfg.system_prompt_path),
        })
    }

    async fn complete(&self, user_prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            r#type: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            response_format: ResponseFormat,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &self.system_prompt,
                },
                Msg {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                r#type: "json_object",
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("openai returned {status}");
        }
        let body: Resp = resp.json().await.context("openai response body")?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow!("openai reply has no content"))
    }

    async fn enrich(
        &self,
        category: Category,
        entries: &[DigestEntry],
        guidance: &str,
    ) -> Result<BTreeMap<String, (String, String)>> {
        let prompt = build_user_prompt(category, guidance, entries)?;
        let content = self.complete(&prompt).await?;
        parse_enrichment(&content)
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn summarize(
        &self,
        category: Category,
        entry: &DigestEntry,
        guidance: &str,
    ) -> Result<(String, String)> {
        let mut rows = self
            .enrich(category, std::slice::from_ref(entry), guidance)
            .await?;
        rows.remove(&entry.group_id)
            .ok_or_else(|| anyhow!("openai reply has no row for {}", entry.group_id))
    }

    async fn summarize_section(
        &self,
        category: Category,
        entries: &[DigestEntry],
        guidance: &str,
    ) -> Vec<Option<(String, String)>> {
        if entries.is_empty() {
            return Vec::new();
        }
        match self.enrich(category, entries, guidance).await {
            Ok(mut rows) => entries.iter().map(|e| rows.remove(&e.group_id)).collect(),
            Err(e) => {
                tracing::warn!(
                    target: "summarizer",
                    section = category.slug(),
                    error = %format!("{e:#}"),
                    "openai enrichment failed"
                );
                vec![None; entries.len()]
            }
        }
    }
}

/// Summarizer for this config: OpenAI when enabled with a key, otherwise [`DisabledSummarizer`].
pub fn build_summarizer(cfg: &SummarizerConfig) -> Box<dyn Summarizer> {
    if !cfg.enabled {
        tracing::info!(target: "summarizer", "summarizer disabled by config");
        return Box::new(DisabledSummarizer);
    }
    if cfg.provider != "openai" {
        tracing::warn!(target: "summarizer", provider = %cfg.provider, "unknown summarizer provider");
        return Box::new(DisabledSummarizer);
    }
    match OpenAiSummarizer::new(cfg) {
        Ok(s) => Box::new(s),
        Err(e) => {
            tracing::info!(target: "summarizer", reason = %e, "using local summaries");
            Box::new(DisabledSummarizer)
        }
    }
}

/// Fill `summary` and `why_it_matters` on every entry. Returns the number of fallbacks.
pub async fn enrich_digest(
    digest: &mut Digest,
    summarizer: &dyn Summarizer,
    prompts_dir: &Path,
) -> usize {
    crate::ingest::ensure_metrics_described();
    let mut fallbacks = 0usize;
    for section in digest.sections.iter_mut() {
        if section.items.is_empty() {
            continue;
        }
        let guidance = load_guidance(prompts_dir, section.category);
        let results = summarizer
            .summarize_section(section.category, &section.items, &guidance)
            .await;
        for (i, entry) in section.items.iter_mut().enumerate() {
            let (summary, why) = match results.get(i).cloned().flatten() {
                Some((s, w)) if !s.trim().is_empty() && !w.trim().is_empty() => (s, w),
                _ => {
                    fallbacks += 1;
                    fallback_copy(entry, section.category)
                }
            };
            entry.summary = summary;
            entry.why_it_matters = why;
        }
    }
    if fallbacks > 0 {
        counter!("summarizer_fallback_total").increment(fallbacks as u64);
        tracing::warn!(
            target: "summarizer",
            provider = summarizer.name(),
            fallbacks,
            entries = digest.item_count(),
            "entries used local fallback summaries"
        );
    }
    fallbacks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_sentence_keeps_short_text() {
        assert_eq!(safe_sentence("  one \n two  ", 50), "one two");
    }

    #[test]
    fn safe_sentence_cuts_at_late_period() {
        let text = format!("{}. {}", "a".repeat(90), "b".repeat(200));
        let out = safe_sentence(&text, 120);
        assert_eq!(out, format!("{}.", "a".repeat(90)));
    }

    #[test]
    fn safe_sentence_uses_ellipsis_without_late_period() {
        let text = format!("Short. {}", "c".repeat(300));
        let out = safe_sentence(&text, 100);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 99 + 3);
    }

    #[test]
    fn enrichment_rows_with_blank_fields_are_dropped() {
        let rows = parse_enrichment(
            r#"{"items":[
                {"id":"a","summary":"Fine.","why_it_matters":"Useful."},
                {"id":"b","summary":"","why_it_matters":"x"},
                {"summary":"no id","why_it_matters":"x"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows["a"].0, "Fine.");
        assert!(parse_enrichment("not json").is_err());
    }

    #[test]
    fn missing_guidance_uses_lens() {
        let dir = tempfile::tempdir().unwrap();
        let g = load_guidance(dir.path(), Category::ForFun);
        assert_eq!(g, format!("Focus lens: {}.", Category::ForFun.lens()));

        std::fs::write(dir.path().join("for-fun.md"), "  Keep it light.  \n").unwrap();
        assert_eq!(load_guidance(dir.path(), Category::ForFun), "Keep it light.");
    }

    #[test]
    fn user_prompt_carries_section_and_payload() {
        let p = build_user_prompt(Category::Engineering, "Be terse.", &[]).unwrap();
        assert!(p.starts_with("Section: engineering\n"));
        assert!(p.contains("Be terse."));
        assert!(p.contains("Input JSON:\n[]"));
    }
}
