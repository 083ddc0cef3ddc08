//! Editor labels and text cleanup shared by the converters.

use regex::Regex;
use std::sync::OnceLock;

fn tag_pattern() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

/// Remove every HTML tag.
pub fn strip_tags(text: &str) -> String {
    tag_pattern().replace_all(text, "").into_owned()
}

/// Entity-decoded, tag-free, escaped text for a text-only element.
pub fn plain_text(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    let stripped = strip_tags(&decoded);
    html_escape::encode_text(stripped.trim()).into_owned()
}

/// Clean up a builder label for use as a block name. Falls back when nothing
/// printable is left.
pub fn sanitize_label(label: &str, fallback: &str) -> String {
    static CSS_HINT: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let label = label.trim();
    if label.is_empty() {
        return fallback.to_string();
    }
    let decoded = html_escape::decode_html_entities(label);
    let css_hint = CSS_HINT.get_or_init(|| Regex::new(r"(?i)\(\s*css(?:\s+tab)?\s*\)").unwrap());
    let cleaned = css_hint.replace_all(&decoded, "");
    let cleaned = strip_tags(&cleaned).replace(['<', '>'], "");
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s{2,}").unwrap());
    let cleaned = spaces.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B' | '-' | ':' | '|'));

    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `text-link` → `Text-link`.
pub fn type_label(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Element".to_string(),
    }
}
