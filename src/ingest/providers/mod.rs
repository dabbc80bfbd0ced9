// src/ingest/providers/mod.rs
pub mod arxiv;
pub mod feed;
pub mod hackernews;
pub mod linkedin;
pub mod sample;
pub mod x;

/// `@user: text` style title for social posts, capped at `max_chars` of text.
pub(crate) fn social_title(prefix: &str, content: &str, max_chars: usize) -> String {
    let cleaned = crate::ingest::clean_text(content, usize::MAX);
    if cleaned.is_empty() {
        return prefix.to_string();
    }
    if cleaned.chars().count() <= max_chars {
        return format!("{prefix}: {cleaned}");
    }
    let head: String = cleaned.chars().take(max_chars.saturating_sub(4)).collect();
    format!("{prefix}: {}...", head.trim_end())
}
