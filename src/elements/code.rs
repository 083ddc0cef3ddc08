//! Passthrough converters: custom code, raw HTML, notes and shortcodes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

use super::blocks::{BlockNode, ElementBlock};
use super::labels::strip_tags;
use super::ConvertContext;
use crate::diagnostics::DiagnosticKind;
use crate::document::SourceElement;

fn trimmed_setting(element: &SourceElement, key: &str) -> String {
    element
        .settings
        .get(key)
        .and_then(Value::as_str)
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

fn contains_php(code: &str) -> bool {
    code.contains("<?")
}

/// Pull the bodies of every `<tag>…</tag>` pair out of `html`.
fn extract_tag_bodies(html: &str, pattern: &Regex) -> (Vec<String>, String) {
    let bodies = pattern
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|body| body.as_str().trim().to_string())
        .filter(|body| !body.is_empty())
        .collect();
    (bodies, pattern.replace_all(html, "").into_owned())
}

fn script_pattern() -> &'static Regex {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    SCRIPT.get_or_init(|| Regex::new(r"(?is)<script(?:\s[^>]*)?>(.+?)</script>").unwrap())
}

fn style_pattern() -> &'static Regex {
    static STYLE: OnceLock<Regex> = OnceLock::new();
    STYLE.get_or_init(|| Regex::new(r"(?is)<style(?:\s[^>]*)?>(.+?)</style>").unwrap())
}

fn strip_html_comments(html: &str) -> String {
    static COMMENT: OnceLock<Regex> = OnceLock::new();
    let comment = COMMENT.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
    comment.replace_all(html, "").trim().to_string()
}

fn php_warning(code: &str, label: &str) -> BlockNode {
    let content = format!(
        "<!-- [EFS Migration] PHP code detected - manual migration required.\nOriginal code:\n{}\n-->",
        html_escape::encode_safe(code)
    );
    BlockNode::raw_html(format!("{} (PHP - requires manual migration)", label), content, false)
}

/// Code elements. Scripts move into the `script` payload of a `div`, styles
/// into a raw `<style>` block (and [`ConvertContext::extracted_css`]), and
/// the remaining markup into a raw-html block. PHP cannot run in the target
/// and is kept only as a commented-out warning.
pub fn convert_code(element: &SourceElement, ctx: &mut ConvertContext) -> Option<BlockNode> {
    let code = trimmed_setting(element, "code");
    let label = ctx.label(element, "Code");

    if contains_php(&code) {
        ctx.report(
            DiagnosticKind::UnsupportedCode,
            element,
            format!("PHP in code element '{}' needs manual migration", label),
        );
        return Some(php_warning(&code, &label));
    }

    let (scripts, remaining) = extract_tag_bodies(&code, script_pattern());
    let (styles, remaining) = extract_tag_bodies(&remaining, style_pattern());

    let javascript = std::iter::once(trimmed_setting(element, "javascriptCode"))
        .filter(|js| !js.is_empty())
        .chain(scripts)
        .collect::<Vec<_>>()
        .join("\n\n");
    let css = std::iter::once(trimmed_setting(element, "cssCode"))
        .filter(|css| !css.is_empty())
        .chain(styles)
        .collect::<Vec<_>>()
        .join("\n\n");
    let html = strip_html_comments(&remaining);

    let mut blocks: Vec<BlockNode> = Vec::new();
    if !javascript.is_empty() {
        let resolved = ctx.resolve(element);
        let script = ElementBlock::new(label.clone(), "div")
            .styles(&resolved.style_ids)
            .extra("script", json!({ "code": BASE64.encode(javascript.as_bytes()) }));
        blocks.push(script.into());
    }
    if !css.is_empty() {
        log::debug!("lifted {} bytes of css from code element {}", css.len(), element.id);
        blocks.push(BlockNode::raw_html(
            format!("{} (CSS)", label),
            format!("<style>{}</style>", css),
            false,
        ));
        ctx.extracted_css.push(css);
    }
    if !html.is_empty() {
        let execute = matches!(element.settings.get("executeCode"), Some(Value::Bool(true)));
        blocks.push(BlockNode::raw_html(label, html, execute));
    }

    match blocks.len() {
        0 => None,
        1 => blocks.pop(),
        _ => Some(BlockNode::Fragment(blocks)),
    }
}

/// Markup already in the target format, passed through verbatim.
pub fn convert_html(element: &SourceElement, ctx: &mut ConvertContext) -> BlockNode {
    let html = element.setting_str("html").unwrap_or_default();
    BlockNode::raw_html(ctx.label(element, "HTML"), html, false)
}

/// Editor notes become a migration comment.
pub fn convert_notes(element: &SourceElement) -> BlockNode {
    let raw = element.setting_str("notesContent").unwrap_or_default();
    let text = strip_tags(raw).trim().replace("--", "\u{2013}");
    if text.is_empty() {
        BlockNode::Comment("MIGRATION NOTE: (empty)".to_string())
    } else {
        BlockNode::Comment(format!("MIGRATION NOTE: {}", text))
    }
}

pub fn convert_shortcode(element: &SourceElement, ctx: &mut ConvertContext) -> Option<BlockNode> {
    let shortcode = trimmed_setting(element, "shortcode");
    if shortcode.is_empty() {
        return None;
    }
    Some(BlockNode::raw_html(ctx.label(element, "Shortcode"), shortcode, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{ConvertOptions, RawHtmlBlock};
    use crate::styles::StyleConversion;
    use pretty_assertions::assert_eq;

    fn element(kind: &str, settings: Value) -> SourceElement {
        SourceElement::new("c1", kind)
            .with_label("Widget")
            .with_settings(settings.as_object().cloned().unwrap())
    }

    #[test]
    fn test_code_splits_script_style_and_markup() {
        let styles = StyleConversion::default();
        let options = ConvertOptions::default();
        let mut ctx = ConvertContext::new(&styles, &options);
        let node = element(
            "code",
            json!({
                "code": "<!-- note --><div>Hi</div><script>alert(1)</script><style>.a{color:red}</style>",
                "executeCode": true
            }),
        );

        let Some(BlockNode::Fragment(parts)) = convert_code(&node, &mut ctx) else {
            panic!("expected fragment");
        };
        assert_eq!(parts.len(), 3);
        let script = parts[0].elements()[0];
        assert_eq!(script.extra["script"]["code"], BASE64.encode("alert(1)"));
        assert_eq!(
            parts[1],
            BlockNode::raw_html("Widget (CSS)", "<style>.a{color:red}</style>", false)
        );
        assert_eq!(
            parts[2],
            BlockNode::RawHtml(RawHtmlBlock {
                metadata_name: "Widget".to_string(),
                content: "<div>Hi</div>".to_string(),
                unsafe_markup: true,
            })
        );
        assert_eq!(ctx.extracted_css, vec![".a{color:red}".to_string()]);
    }

    #[test]
    fn test_php_code_becomes_warning() {
        let styles = StyleConversion::default();
        let options = ConvertOptions::default();
        let mut ctx = ConvertContext::new(&styles, &options);
        let node = element("code", json!({ "code": "<?php echo 1; ?>" }));

        let Some(BlockNode::RawHtml(warning)) = convert_code(&node, &mut ctx) else {
            panic!("expected raw html");
        };
        assert_eq!(warning.metadata_name, "Widget (PHP - requires manual migration)");
        assert!(warning.content.contains("&lt;?php echo 1; ?&gt;"));
        assert!(ctx.diagnostics.has(DiagnosticKind::UnsupportedCode));
    }

    #[test]
    fn test_empty_code_yields_nothing() {
        let styles = StyleConversion::default();
        let options = ConvertOptions::default();
        let mut ctx = ConvertContext::new(&styles, &options);
        assert_eq!(convert_code(&element("code", json!({ "code": "<!-- x -->" })), &mut ctx), None);
    }

    #[test]
    fn test_notes_and_shortcode() {
        let note = element("fr-notes", json!({ "notesContent": "<p>Check -- later</p>" }));
        assert_eq!(
            convert_notes(&note),
            BlockNode::Comment("MIGRATION NOTE: Check \u{2013} later".to_string())
        );
        assert_eq!(
            convert_notes(&element("fr-notes", json!({}))),
            BlockNode::Comment("MIGRATION NOTE: (empty)".to_string())
        );

        let styles = StyleConversion::default();
        let options = ConvertOptions::default();
        let mut ctx = ConvertContext::new(&styles, &options);
        let shortcode = element("shortcode", json!({ "shortcode": "[gallery ids=\"1,2\"]" }));
        assert_eq!(
            convert_shortcode(&shortcode, &mut ctx),
            Some(BlockNode::raw_html("Widget", "[gallery ids=\"1,2\"]", false))
        );
        assert_eq!(
            convert_html(&element("html", json!({ "html": "<b>x</b>" })), &mut ctx),
            BlockNode::raw_html("Widget", "<b>x</b>", false)
        );
    }
}
