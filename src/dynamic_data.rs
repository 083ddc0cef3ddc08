//! Dynamic-data placeholders: `{post_title}`, `{post_title|uppercase}`,
//! `{post_excerpt:20}`, `{acf_hero_image}` … rewritten into Etch expressions
//! (`{this.title}`, `{this.title.toUpperCase()}`, …).
//!
//! The rewrite is an explicit ordered list of pure regex passes. Every pass
//! only matches source syntax, so running the whole chain on its own output is
//! a no-op.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Fixed tag → expression table.
const TAG_MAPPING: &[(&str, &str)] = &[
    ("post_title", "this.title"),
    ("post_content", "this.content"),
    ("post_excerpt", "this.excerpt"),
    ("post_date", "this.date"),
    ("post_modified", "this.modified"),
    ("post_author", "this.author.name"),
    ("post_id", "this.id"),
    ("post_slug", "this.slug"),
    ("post_url", "this.url"),
    ("site_title", "site.name"),
    ("site_tagline", "site.description"),
    ("site_url", "site.url"),
    ("site_admin_email", "site.admin_email"),
    ("author_name", "this.author.name"),
    ("term_name", "this.term.name"),
    ("post_terms_category", "this.terms.category"),
    ("current_date", "site.date"),
    ("user_login", "user.login"),
    ("user_email", "user.email"),
    ("user_display_name", "user.display_name"),
    ("user_first_name", "user.first_name"),
    ("user_last_name", "user.last_name"),
    ("query_title", "query.title"),
    ("query_content", "query.content"),
    ("query_excerpt", "query.excerpt"),
    ("query_date", "query.date"),
    ("query_author", "query.author.name"),
    ("query_id", "query.id"),
    ("query_slug", "query.slug"),
    ("query_url", "query.url"),
    ("url_parameter", "url.parameter"),
    ("meta", "this.meta"),
];

/// Modifier name → function call. Unknown modifiers become `name()`.
const MODIFIER_MAPPING: &[(&str, &str)] = &[
    ("uppercase", "toUpperCase()"),
    ("lowercase", "toLowerCase()"),
    ("capitalize", "capitalize()"),
    ("date", "dateFormat()"),
    ("time", "timeFormat()"),
    ("number", "numberFormat()"),
    ("currency", "currencyFormat()"),
    ("slug", "toSlug()"),
    ("length", "length()"),
    ("first", "at(0)"),
    ("last", "at(-1)"),
    ("limit", "limit()"),
    ("excerpt", "excerpt()"),
    ("strip_tags", "stripTags()"),
    ("trim", "trim()"),
];

/// Tags owned by other runtimes; left untouched and classified as deferred.
const DEFERRED_PREFIXES: &[&str] = &["woo_", "echo_", "do_action"];

/// Namespaces rewritten by their own dedicated pass.
const DEDICATED_NAMESPACES: &[&str] = &[
    "acf", "mb", "metabox", "jet", "jetengine", "meta", "query", "url_parameter",
];

/// Expression roots produced by the rewrite.
const CONVERTED_ROOTS: &[&str] = &["this.", "site.", "user.", "query.", "url."];

const MEDIA_QUERY_KINDS: &[&str] = &["attachment", "media"];

// ─── Context ─────────────────────────────────────────────────────────────────

/// Loop scope a node renders in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopScope {
    /// Token that replaces `this` inside the loop body.
    pub alias: String,
    /// Post type or object type the loop iterates, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_kind: Option<String>,
}

impl LoopScope {
    pub fn new(alias: impl Into<String>, query_kind: Option<String>) -> Self {
        Self {
            alias: alias.into(),
            query_kind,
        }
    }

    fn targets_media(&self) -> bool {
        self.query_kind
            .as_deref()
            .map(|kind| MEDIA_QUERY_KINDS.contains(&kind.trim().to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_scope: Option<LoopScope>,
}

impl DynamicContext {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn in_loop(alias: impl Into<String>, query_kind: Option<String>) -> Self {
        Self {
            loop_scope: Some(LoopScope::new(alias, query_kind)),
        }
    }
}

/// How far a tag can be migrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSupport {
    Supported,
    /// Belongs to a plugin runtime that is migrated separately.
    Deferred,
    Unsupported,
}

// ─── Rewriting ───────────────────────────────────────────────────────────────

/// Rewrite every placeholder in `text`. Unconvertible tags are left as they
/// are; use [`rewrite_with_diagnostics`] to have them reported.
pub fn rewrite(text: &str, context: &DynamicContext) -> String {
    if text.is_empty() {
        return String::new();
    }
    let converted = convert_basic_tags(text);
    let converted = convert_tags_with_modifiers(&converted);
    let converted = convert_tags_with_colon_params(&converted);
    let converted = convert_field_families(&converted);
    let converted = convert_namespaced_tags(&converted);
    match &context.loop_scope {
        Some(scope) => rebind_loop_scope(&converted, scope),
        None => converted,
    }
}

/// [`rewrite`], reporting each remaining unconvertible tag.
pub fn rewrite_with_diagnostics(
    text: &str,
    context: &DynamicContext,
    element_id: Option<&str>,
    diagnostics: &mut Diagnostics,
) -> String {
    let converted = rewrite(text, context);
    for tag in unconverted_tags(&converted, context) {
        let message = format!("dynamic data tag {{{}}} has no Etch equivalent", tag);
        match element_id {
            Some(id) => diagnostics.report_for(DiagnosticKind::UnconvertibleTag, id, message),
            None => diagnostics.report(DiagnosticKind::UnconvertibleTag, message),
        }
    }
    converted
}

fn lookup<'t>(table: &'t [(&str, &str)], key: &str) -> Option<&'t str> {
    table.iter().find(|(from, _)| *from == key).map(|(_, to)| *to)
}

fn modifier_call(name: &str, param: Option<&str>) -> String {
    let call = lookup(MODIFIER_MAPPING, name)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}()", name));
    match param.filter(|p| !p.is_empty()) {
        Some(param) => call.replacen("()", &format!("({})", param), 1),
        None => call,
    }
}

fn is_field_family(tag: &str) -> bool {
    static FAMILY: OnceLock<Regex> = OnceLock::new();
    let re = FAMILY.get_or_init(|| Regex::new(r"^(?:acf|mb|metabox|jet|jetengine)[_:]").unwrap());
    re.is_match(tag)
}

fn is_deferred(tag: &str) -> bool {
    DEFERRED_PREFIXES.iter().any(|prefix| tag.starts_with(prefix))
}

/// Pass 1: `{post_title}` → `{this.title}`.
fn convert_basic_tags(text: &str) -> String {
    static BASIC: OnceLock<Regex> = OnceLock::new();
    let re = BASIC.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").unwrap());
    re.replace_all(text, |caps: &Captures| match lookup(TAG_MAPPING, &caps[1]) {
        Some(expression) => format!("{{{}}}", expression),
        None => caps[0].to_string(),
    })
    .into_owned()
}

/// Pass 2: `{tag|modifier:param}` → `{expr.fn(param)}`. Tags missing from
/// the mapping stay as written.
fn convert_tags_with_modifiers(text: &str) -> String {
    static MODIFIED: OnceLock<Regex> = OnceLock::new();
    let re = MODIFIED.get_or_init(|| {
        Regex::new(r"\{([a-zA-Z0-9_-]+)\|([a-zA-Z0-9_]+)(?::([^}]+))?\}").unwrap()
    });
    re.replace_all(text, |caps: &Captures| {
        let tag = &caps[1];
        if is_field_family(tag) || is_deferred(tag) {
            return caps[0].to_string();
        }
        let Some(expression) = lookup(TAG_MAPPING, tag) else {
            return caps[0].to_string();
        };
        let call = modifier_call(&caps[2], caps.get(3).map(|m| m.as_str()));
        format!("{{{}.{}}}", expression, call)
    })
    .into_owned()
}

/// Pass 3: legacy `{tag:N}` → `{expr.stripTags().truncateWords(N)}`, other
/// parameters → `{expr(param)}`. Tags missing from the mapping stay as
/// written.
fn convert_tags_with_colon_params(text: &str) -> String {
    static COLON: OnceLock<Regex> = OnceLock::new();
    let re = COLON.get_or_init(|| Regex::new(r"\{([a-zA-Z0-9_-]+):([^}|]+)\}").unwrap());
    re.replace_all(text, |caps: &Captures| {
        let tag = &caps[1];
        let param = caps[2].trim();
        if is_field_family(tag) || is_deferred(tag) || DEDICATED_NAMESPACES.contains(&tag) {
            return caps[0].to_string();
        }
        let Some(expression) = lookup(TAG_MAPPING, tag) else {
            return caps[0].to_string();
        };
        if !param.is_empty() && param.bytes().all(|b| b.is_ascii_digit()) {
            format!("{{{}.stripTags().truncateWords({})}}", expression, param)
        } else {
            format!("{{{}({})}}", expression, param)
        }
    })
    .into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldShape {
    Image,
    Gallery,
    Repeater,
    Plain,
}

fn field_shape(field: &str) -> FieldShape {
    static IMAGE: OnceLock<Regex> = OnceLock::new();
    static GALLERY: OnceLock<Regex> = OnceLock::new();
    static REPEATER: OnceLock<Regex> = OnceLock::new();

    let image = IMAGE.get_or_init(|| {
        Regex::new(r"(?i)(?:_(?:image|img|photo|picture|logo|avatar)$|^(?:image|img|photo|picture|logo|avatar)_)")
            .unwrap()
    });
    let gallery = GALLERY.get_or_init(|| {
        Regex::new(r"(?i)(?:_(?:gallery|gallery_images|images)$|^(?:gallery|gallery_images|images)_)").unwrap()
    });
    let repeater = REPEATER.get_or_init(|| {
        Regex::new(r"(?i)(?:_(?:repeater|items|list|rows)$|^(?:repeater|items|list|rows)_)").unwrap()
    });

    if image.is_match(field) {
        FieldShape::Image
    } else if gallery.is_match(field) {
        FieldShape::Gallery
    } else if repeater.is_match(field) {
        FieldShape::Repeater
    } else {
        FieldShape::Plain
    }
}

fn namespace_of(prefix: &str) -> &'static str {
    match prefix {
        "acf" => "acf",
        "mb" | "metabox" => "metabox",
        _ => "jetengine",
    }
}

fn field_expression(namespace: &str, field: &str) -> String {
    let path = format!("this.{}.{}", namespace, field);
    match field_shape(field) {
        FieldShape::Image => format!("{{{}.url}}", path),
        FieldShape::Gallery => format!(
            "{{#loop {} as image}}<img src=\"{{image.url}}\" alt=\"{{image.alt}}\" />{{/loop}}",
            path
        ),
        FieldShape::Repeater => format!("{{#loop {} as item}}<div>{{item.sub_field}}</div>{{/loop}}", path),
        FieldShape::Plain => format!("{{{}}}", path),
    }
}

/// Pass 4: ACF, MetaBox and JetEngine field tags.
fn convert_field_families(text: &str) -> String {
    static PLAIN: OnceLock<Regex> = OnceLock::new();
    static MODIFIED: OnceLock<Regex> = OnceLock::new();

    let plain = PLAIN.get_or_init(|| {
        Regex::new(r"\{(jetengine|metabox|acf|mb|jet)[_:]([a-zA-Z0-9_-]+)\}").unwrap()
    });
    let converted = plain.replace_all(text, |caps: &Captures| {
        field_expression(namespace_of(&caps[1]), &caps[2])
    });

    let modified = MODIFIED.get_or_init(|| {
        Regex::new(r"\{(jetengine|metabox|acf|mb|jet)[_:]([a-zA-Z0-9_-]+)\|([a-zA-Z0-9_]+)(?::([^}]+))?\}")
            .unwrap()
    });
    modified
        .replace_all(&converted, |caps: &Captures| {
            let call = modifier_call(&caps[3], caps.get(4).map(|m| m.as_str()));
            format!("{{this.{}.{}.{}}}", namespace_of(&caps[1]), &caps[2], call)
        })
        .into_owned()
}

/// Pass 5: `{meta:x}`, `{query:x}` and `{url_parameter:x}`.
fn convert_namespaced_tags(text: &str) -> String {
    static NAMESPACED: OnceLock<Regex> = OnceLock::new();
    let re = NAMESPACED
        .get_or_init(|| Regex::new(r"\{(meta|query|url_parameter):([a-zA-Z0-9_-]+)\}").unwrap());
    re.replace_all(text, |caps: &Captures| {
        let root = match &caps[1] {
            "meta" => "this.meta",
            "query" => "query",
            _ => "url.parameter",
        };
        format!("{{{}.{}}}", root, &caps[2])
    })
    .into_owned()
}

/// `this.` → `<alias>.` inside `{…}` only.
fn rebind_loop_scope(text: &str, scope: &LoopScope) -> String {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    static THIS: OnceLock<Regex> = OnceLock::new();

    let alias = scope.alias.trim();
    if alias.is_empty() || alias == "this" {
        return text.to_string();
    }
    let token = TOKEN.get_or_init(|| Regex::new(r"\{[^{}]*\}").unwrap());
    let this = THIS.get_or_init(|| Regex::new(r"\bthis\.").unwrap());
    let media = scope.targets_media();
    let image_id = format!("{}.image.id", alias);
    let image_url = format!("{}.image.url", alias);
    let replacement = format!("{}.", alias);

    token
        .replace_all(text, |caps: &Captures| {
            let rebound = this.replace_all(&caps[0], replacement.as_str()).into_owned();
            if media {
                rebound
                    .replace(&image_id, &format!("{}.id", alias))
                    .replace(&image_url, &format!("{}.url", alias))
            } else {
                rebound
            }
        })
        .into_owned()
}

/// Source-syntax tags left after rewriting, with or without a modifier or
/// parameter.
fn unconverted_tags(text: &str, context: &DynamicContext) -> Vec<String> {
    static BARE: OnceLock<Regex> = OnceLock::new();
    let re = BARE.get_or_init(|| Regex::new(r"\{([a-zA-Z0-9_-]+(?:[:|][^{}\r\n]*)?)\}").unwrap());
    let alias = context.loop_scope.as_ref().map(|scope| format!("{}.", scope.alias));

    let mut tags: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        let tag = &caps[1];
        let converted = CONVERTED_ROOTS.iter().any(|root| tag.starts_with(root))
            || alias.as_deref().map(|a| tag.starts_with(a)).unwrap_or(false);
        if !converted && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

// ─── Inspection ──────────────────────────────────────────────────────────────

/// Unique `{…}` tokens of `text`, in order of first appearance.
pub fn extract_dynamic_tags(text: &str) -> Vec<String> {
    static TAG: OnceLock<Regex> = OnceLock::new();
    if text.trim().is_empty() {
        return Vec::new();
    }
    let re = TAG.get_or_init(|| Regex::new(r"\{[^{}\r\n]+\}").unwrap());
    let mut tags: Vec<String> = Vec::new();
    for found in re.find_iter(text) {
        let tag = found.as_str().trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Whether a source tag, with or without braces, can be migrated.
pub fn classify_dynamic_tag(tag: &str) -> TagSupport {
    let normalized = tag.trim().trim_matches(|c| c == '{' || c == '}').trim().to_lowercase();
    if normalized.is_empty() {
        return TagSupport::Unsupported;
    }
    if CONVERTED_ROOTS.iter().any(|root| normalized.starts_with(root)) {
        return TagSupport::Supported;
    }

    let base = normalized.split('|').next().unwrap_or_default();
    let base = base.split(':').next().unwrap_or_default().trim();
    if base.is_empty() {
        return TagSupport::Unsupported;
    }
    if lookup(TAG_MAPPING, base).is_some()
        || DEDICATED_NAMESPACES.iter().any(|ns| base.starts_with(ns))
    {
        return TagSupport::Supported;
    }
    if is_deferred(base) {
        return TagSupport::Deferred;
    }
    TagSupport::Unsupported
}

pub fn is_convertible_dynamic_tag(tag: &str) -> bool {
    classify_dynamic_tag(tag) == TagSupport::Supported
}
