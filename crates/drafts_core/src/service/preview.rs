//! Plain-text previews of rich-text markup for document lists.

use once_cell::sync::Lazy;
use regex::Regex;

const PREVIEW_MAX_CHARS: usize = 100;

static MARKUP_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Derives list preview text from serialized rich-text content.
///
/// Rules:
/// - markup tags are replaced by spaces, then common entities are decoded;
/// - whitespace is collapsed and trimmed;
/// - the first 100 chars are kept;
/// - `None` when nothing readable remains.
pub fn derive_preview_text(content: &str) -> Option<String> {
    let without_tags = MARKUP_TAG_RE.replace_all(content, " ");
    let decoded = decode_entities(&without_tags);
    let normalized = WHITESPACE_RE.replace_all(&decoded, " ");
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(PREVIEW_MAX_CHARS).collect())
    }
}

fn decode_entities(value: &str) -> String {
    // `&amp;` last so that `&amp;lt;` decodes to the literal `&lt;`.
    value
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
