//! Markup cleanup for oracle-bound text

use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Strip tags, decode the common entities and collapse whitespace
#[must_use]
pub fn plain_text(markup: &str) -> String {
    let without_tags = TAG.replace_all(markup, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    SPACE.replace_all(&decoded, " ").trim().to_string()
}

/// [`plain_text`] cut to at most `max_chars` characters
#[must_use]
pub fn preview(markup: &str, max_chars: usize) -> String {
    let text = plain_text(markup);
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text,
    }
}
