//! Raw custom-CSS blobs → per-selector rule sets in nested (`&`) form.
//!
//! The builder stores hand-written CSS per class and per element. Those snippets
//! are concatenated into one stylesheet, then split back out here by class name
//! or element id so they can be merged into the matching registry entry.

use indexmap::IndexSet;
use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::breakpoints::{normalize_media_condition_to_etch, BreakpointResolver};
use super::normalizer::{normalize_deprecated_hsl_references, normalize_id_selectors};
use super::settings::normalize_selector_suffix_with_ampersand;

/// Placeholder the builder uses for "the selector this snippet belongs to".
pub const ROOT_PLACEHOLDER: &str = "%root%";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Class,
    Id,
}

impl SelectorKind {
    fn sigil(self) -> char {
        match self {
            SelectorKind::Class => '.',
            SelectorKind::Id => '#',
        }
    }
}

/// All CSS found for one class or id, with the subject rewritten to `&`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedRule {
    /// Bare class or id name, without the sigil.
    pub name: String,
    pub selector: String,
    pub css: String,
}

// ─── Snippet preparation ─────────────────────────────────────────────────────

/// Resolve `%root%` to the owning selector and repair deprecated hsl tokens.
pub fn resolve_root_placeholder(snippet: &str, root_selector: &str) -> String {
    normalize_deprecated_hsl_references(&snippet.replace(ROOT_PLACEHOLDER, root_selector))
}

/// Wrap a snippet in the media query of `breakpoint`. Unknown breakpoints leave
/// the snippet unwrapped.
pub fn wrap_for_breakpoint(snippet: &str, breakpoint: &str, resolver: &BreakpointResolver) -> String {
    match resolver.media_query_for(breakpoint) {
        Some(media) => format!("{} {{\n{}\n}}", media, snippet),
        None => snippet.to_string(),
    }
}

/// Body of the first `.name { … }` rule in a snippet, if any.
pub fn extract_declaration_block(snippet: &str, kind: SelectorKind, name: &str) -> Option<String> {
    let pattern = format!(
        r"{}{}\s*\{{([^}}]*)\}}",
        regex::escape(&kind.sigil().to_string()),
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(snippet).map(|caps| caps[1].trim().to_string())
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Every class in the stylesheet with its rules nested under `&`.
pub fn parse_class_rules(stylesheet: &str) -> Vec<ScopedRule> {
    parse_scoped_rules(stylesheet, SelectorKind::Class)
}

/// Every element id in the stylesheet with its rules nested under `&`.
/// `#brxe-x` selectors are renamed to `#etch-x` first.
pub fn parse_id_rules(stylesheet: &str) -> Vec<ScopedRule> {
    parse_scoped_rules(stylesheet, SelectorKind::Id)
}

fn parse_scoped_rules(stylesheet: &str, kind: SelectorKind) -> Vec<ScopedRule> {
    let stylesheet = normalize_id_selectors(stylesheet);

    let mut rules = Vec::new();
    for name in collect_names(&stylesheet, kind) {
        let css = extract_rules_for(&stylesheet, kind, &name);
        if css.trim().is_empty() {
            continue;
        }
        let nested = nest_rules(&css, kind, &name);
        log::trace!("nested custom css for {}{}", kind.sigil(), name);
        rules.push(ScopedRule {
            selector: format!("{}{}", kind.sigil(), name),
            css: nested.trim().to_string(),
            name,
        });
    }
    rules
}

fn collect_names(stylesheet: &str, kind: SelectorKind) -> IndexSet<String> {
    static CLASS_NAME: OnceLock<Regex> = OnceLock::new();
    static ID_NAME: OnceLock<Regex> = OnceLock::new();

    let re = match kind {
        SelectorKind::Class => CLASS_NAME.get_or_init(|| Regex::new(r"\.([a-zA-Z0-9_-]+)").unwrap()),
        SelectorKind::Id => ID_NAME.get_or_init(|| Regex::new(r"#([a-zA-Z_][a-zA-Z0-9_-]*)").unwrap()),
    };
    re.captures_iter(stylesheet).map(|caps| caps[1].to_string()).collect()
}

/// Whether `sigil + name` occurs as a whole selector token.
fn contains_token(haystack: &str, kind: SelectorKind, name: &str) -> bool {
    let token = format!("{}{}", kind.sigil(), name);
    haystack.match_indices(&token).any(|(pos, _)| {
        haystack[pos + token.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_ident_char(c))
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// `<sigil><name>` followed by a selector suffix and a `{ … }` body. The suffix
/// must not continue the identifier.
fn rule_regex(kind: SelectorKind, name: &str) -> Option<Regex> {
    let pattern = format!(
        r"{}{}((?:[^a-zA-Z0-9_\-{{][^{{]*?)?)\{{([^}}]*)\}}",
        regex::escape(&kind.sigil().to_string()),
        regex::escape(name)
    );
    Regex::new(&pattern).ok()
}

fn rule_start_regex(kind: SelectorKind, name: &str) -> Option<Regex> {
    let pattern = format!(
        r"{}{}(?:[^a-zA-Z0-9_\-{{][^{{]*)?\{{",
        regex::escape(&kind.sigil().to_string()),
        regex::escape(name)
    );
    Regex::new(&pattern).ok()
}

/// Collect, line by line, every top-level rule that starts with the token and
/// every `@media` block that mentions it.
fn extract_rules_for(stylesheet: &str, kind: SelectorKind, name: &str) -> String {
    static MEDIA_OPEN: OnceLock<Regex> = OnceLock::new();
    let media_open = MEDIA_OPEN.get_or_init(|| Regex::new(r"@media\s+([^{]+)\{").unwrap());
    let Some(rule_start) = rule_start_regex(kind, name) else {
        return String::new();
    };

    let lines: Vec<&str> = stylesheet.lines().collect();
    let mut parts: Vec<String> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if let Some(caps) = media_open.captures(line) {
            let prelude = format!("@media {}", caps[1].trim());
            let mut depth: i64 = 1;
            let mut content = String::new();
            i += 1;
            while i < lines.len() && depth > 0 {
                depth += brace_delta(lines[i]);
                content.push_str(lines[i]);
                content.push('\n');
                i += 1;
            }
            if depth == 0 && contains_token(&content, kind, name) {
                // Drop the block's own closing brace.
                if let Some(close) = content.rfind('}') {
                    content.truncate(close);
                }
                parts.push(format!("{} {{\n{}\n}}", prelude, content.trim()));
            }
            continue;
        }

        if rule_start.is_match(line) {
            let mut rule = format!("{}\n", line);
            let mut depth = brace_delta(line);
            while depth > 0 && i + 1 < lines.len() {
                i += 1;
                rule.push_str(lines[i]);
                rule.push('\n');
                depth += brace_delta(lines[i]);
            }
            parts.push(rule.trim().to_string());
        }
        i += 1;
    }

    parts.join("\n\n")
}

fn brace_delta(line: &str) -> i64 {
    line.matches('{').count() as i64 - line.matches('}').count() as i64
}

struct AtRule {
    prelude: String,
    css: String,
    original: String,
}

/// Rewrite the collected CSS so the subject selector becomes `&`: bare
/// declarations first, then nested rules, then nested at-rules.
fn nest_rules(css: &str, kind: SelectorKind, name: &str) -> String {
    let at_rules = extract_at_rules(css, kind, name);
    let mut rest = css.to_string();
    for at_rule in &at_rules {
        rest = rest.replace(&at_rule.original, "");
    }

    let mut main_css = String::new();
    let mut nested: Vec<(String, String)> = Vec::new();
    if let Some(re) = rule_regex(kind, name) {
        for caps in re.captures_iter(&rest) {
            let suffix = normalize_selector_suffix_with_ampersand(&caps[1], name);
            let body = caps[2].trim();
            if suffix.trim().is_empty() {
                main_css.push_str(body);
                main_css.push('\n');
            } else {
                nested.push((suffix, body.to_string()));
            }
        }
    }

    let mut result = main_css.trim().to_string();
    for (selector, body) in &nested {
        push_block(&mut result, &format!("{} {{\n  {}\n}}", selector, body));
    }
    for at_rule in &at_rules {
        push_block(&mut result, &format!("{} {{\n  {}\n}}", at_rule.prelude, at_rule.css));
    }

    if result.is_empty() {
        return fallback_ampersand(&rest, kind, name);
    }
    result
}

fn push_block(result: &mut String, block: &str) {
    if !result.is_empty() {
        result.push_str("\n\n");
    }
    result.push_str(block);
}

/// Last resort when no rule matched: swap the token for `&` where it is
/// followed by a combinator or pseudo selector.
fn fallback_ampersand(css: &str, kind: SelectorKind, name: &str) -> String {
    let pattern = format!(
        r"{}{}(\s+[>+~]|\s+[.#\[]|::|:)",
        regex::escape(&kind.sigil().to_string()),
        regex::escape(name)
    );
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(css, |caps: &Captures| format!("&{}", &caps[1])).into_owned(),
        Err(_) => css.to_string(),
    }
}

/// `@media` / `@container` blocks that mention the token, with their inner rules
/// nested and the condition rewritten to Etch range syntax.
fn extract_at_rules(css: &str, kind: SelectorKind, name: &str) -> Vec<AtRule> {
    let bytes = css.as_bytes();
    let mut at_rules = Vec::new();
    let mut pos = 0;

    while pos < css.len() {
        let next = ["@media", "@container"]
            .iter()
            .filter_map(|keyword| css[pos..].find(*keyword).map(|offset| (pos + offset, *keyword)))
            .min_by_key(|(start, _)| *start);
        let Some((start, keyword)) = next else {
            break;
        };
        let Some(open) = css[start..].find('{').map(|offset| start + offset) else {
            break;
        };

        let condition = normalize_media_condition_to_etch(css[start + keyword.len()..open].trim());

        let mut depth = 1;
        let mut i = open + 1;
        while i < bytes.len() && depth > 0 {
            match bytes[i] {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            i += 1;
        }

        if depth == 0 {
            let content = &css[open + 1..i - 1];
            if contains_token(content, kind, name) {
                at_rules.push(AtRule {
                    prelude: format!("{} {}", keyword, condition),
                    css: nest_rules_in_at_rule(content, kind, name).trim().to_string(),
                    original: css[start..i].to_string(),
                });
            }
        }
        pos = i;
    }
    at_rules
}

fn nest_rules_in_at_rule(content: &str, kind: SelectorKind, name: &str) -> String {
    let Some(re) = rule_regex(kind, name) else {
        return String::new();
    };
    let rules: Vec<String> = re
        .captures_iter(content)
        .map(|caps| {
            let mut selector = normalize_selector_suffix_with_ampersand(caps[1].trim(), name);
            if selector.trim().is_empty() {
                selector = "&".to_string();
            }
            format!("{} {{\n    {}\n  }}", selector, caps[2].trim())
        })
        .collect();
    rules.join("\n\n  ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_class_rules_are_nested() {
        let stylesheet = "\n.card {\n  padding: 1rem;\n}\n.card:hover {\n  color: red;\n}\n.card .title {\n  font-weight: 700;\n}\n";
        let rules = parse_class_rules(stylesheet);
        let card = rules.iter().find(|r| r.name == "card").unwrap();
        assert_eq!(card.selector, ".card");
        assert_eq!(
            card.css,
            "padding: 1rem;\n\n&:hover {\n  color: red;\n}\n\n& .title {\n  font-weight: 700;\n}"
        );
    }

    #[test]
    fn test_token_does_not_match_longer_class() {
        let rules = parse_class_rules(".card-title { color: blue; }\n.card { margin: 0; }\n");
        let card = rules.iter().find(|r| r.name == "card").unwrap();
        assert_eq!(card.css, "margin: 0;");
        let title = rules.iter().find(|r| r.name == "card-title").unwrap();
        assert_eq!(title.css, "color: blue;");
    }

    #[test]
    fn test_media_blocks_are_nested_with_etch_condition() {
        let stylesheet = ".hero {\n  gap: 2rem;\n}\n@media (max-width: 767px) {\n  .hero {\n    gap: 1rem;\n  }\n}\n";
        let rules = parse_class_rules(stylesheet);
        let hero = rules.iter().find(|r| r.name == "hero").unwrap();
        assert_eq!(
            hero.css,
            "gap: 2rem;\n\n@media (width <= to-rem(767px)) {\n  & {\n    gap: 1rem;\n  }\n}"
        );
    }

    #[test]
    fn test_id_rules_use_etch_ids() {
        let rules = parse_id_rules("#brxe-abc123 {\n  color: red;\n}\n#brxe-abc123 > a {\n  color: blue;\n}\n");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].selector, "#etch-abc123");
        assert_eq!(rules[0].css, "color: red;\n\n& > a {\n  color: blue;\n}");
    }

    #[test]
    fn test_hex_colors_are_not_ids() {
        let rules = parse_id_rules(".x {\n  color: #fff;\n}\n");
        assert!(rules.is_empty());
    }

    #[test]
    fn test_root_placeholder_and_breakpoint_wrap() {
        let resolver = BreakpointResolver::default();
        let snippet = resolve_root_placeholder("%root% { gap: 0; }", ".grid");
        assert_eq!(snippet, ".grid { gap: 0; }");
        assert_eq!(
            wrap_for_breakpoint(&snippet, "tablet", &resolver),
            "@media (width <= to-rem(991px)) {\n.grid { gap: 0; }\n}"
        );
        assert_eq!(wrap_for_breakpoint(&snippet, "watch", &resolver), snippet);
    }

    #[test]
    fn test_extract_declaration_block() {
        assert_eq!(
            extract_declaration_block(".grid { gap: 0; }", SelectorKind::Class, "grid"),
            Some("gap: 0;".to_string())
        );
        assert_eq!(extract_declaration_block(".other {}", SelectorKind::Class, "grid"), None);
    }
}
