//! Query loops: source query settings → Etch loop presets.
//!
//! A node with `hasLoop` and a `query` object repeats its content once per
//! query result. The query is normalized into a preset config; identical
//! configs under the same context slug share one preset id.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::labels::sanitize_label;
use crate::css::breakpoints::sanitize_key;
use crate::css::settings::{is_truthy, scalar};
use crate::css::Settings;
use crate::styles::short_hash;

/// Alias the loop body uses for the current item.
pub const LOOP_ITEM_ALIAS: &str = "item";

const DEFAULT_LIMIT: &str = "$limit ?? -1";

/// One stored loop preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopPreset {
    pub name: String,
    pub key: String,
    pub global: bool,
    pub config: Value,
    pub context_slug: String,
}

/// Loop presets keyed by loop id, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoopPresets {
    presets: IndexMap<String, LoopPreset>,
}

/// A query reduced to what the target preset stores.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    pub preset_key: String,
    pub config: Value,
}

impl LoopPresets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from presets persisted by an earlier run.
    pub fn from_existing(presets: IndexMap<String, LoopPreset>) -> Self {
        Self { presets }
    }

    pub fn get(&self, loop_id: &str) -> Option<&LoopPreset> {
        self.presets.get(loop_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LoopPreset)> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn into_inner(self) -> IndexMap<String, LoopPreset> {
        self.presets
    }

    /// Loop id for `query`, registering a preset when no identical config
    /// exists under the same context slug.
    pub fn ensure(&mut self, query: &Settings, label: Option<&str>) -> String {
        let normalized = normalize_loop_query(query);
        let config_json = normalized.config.to_string();

        let context_slug = label
            .map(derive_context_slug)
            .filter(|slug| !slug.is_empty())
            .or_else(|| Some(sanitize_key(&normalized.preset_key)).filter(|slug| !slug.is_empty()))
            .unwrap_or_else(|| "posts".to_string());

        let existing = self.presets.iter().find(|(_, preset)| {
            preset.config.to_string() == config_json && preset.context_slug == context_slug
        });
        if let Some((loop_id, _)) = existing {
            log::trace!("reusing loop preset {}", loop_id);
            return loop_id.clone();
        }

        let loop_id = format!("{}_{}", context_slug, short_hash(&config_json));
        let key = match sanitize_key(&normalized.preset_key) {
            key if key.is_empty() => "posts".to_string(),
            key => key,
        };
        log::debug!("registering loop preset {} ({})", loop_id, key);
        self.presets.insert(
            loop_id.clone(),
            LoopPreset {
                name: context_slug.clone(),
                key,
                global: true,
                config: normalized.config,
                context_slug,
            },
        );
        loop_id
    }
}

/// The `query` object of a looping node.
pub fn loop_query(settings: &Settings) -> Option<&Settings> {
    let has_loop = settings.get("hasLoop").map(is_truthy).unwrap_or(false);
    if !has_loop {
        return None;
    }
    settings.get("query").and_then(Value::as_object).filter(|q| !q.is_empty())
}

/// Query types that cannot become a loop preset.
pub fn rejected_query_type(query: &Settings) -> Option<String> {
    let kind = query
        .get("type")
        .and_then(scalar)
        .map(|t| t.trim().to_lowercase())
        .unwrap_or_default();
    let rejected = matches!(kind.as_str(), "woocommerce" | "custom" | "php") || kind.starts_with("wc-");
    rejected.then_some(kind)
}

/// What the loop iterates: the post type for post queries, else the object type.
pub fn query_kind(query: &Settings) -> String {
    let object_type = object_type(query);
    if object_type == "post" {
        first_key(query.get("post_type")).unwrap_or_else(|| "post".to_string())
    } else {
        object_type
    }
}

fn object_type(query: &Settings) -> String {
    query
        .get("objectType")
        .and_then(scalar)
        .map(|t| sanitize_key(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "post".to_string())
}

/// First non-empty entry of a string-or-list setting, sanitized.
fn first_key(value: Option<&Value>) -> Option<String> {
    let first = match value? {
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }?;
    let key = sanitize_key(first.trim());
    (!key.is_empty()).then_some(key)
}

pub fn normalize_loop_query(query: &Settings) -> NormalizedQuery {
    if object_type(query) == "term" {
        let taxonomy = first_key(query.get("taxonomy")).unwrap_or_else(|| "category".to_string());
        return NormalizedQuery {
            preset_key: format!("terms_{}", taxonomy),
            config: json!({ "type": "wp-terms", "args": { "taxonomy": taxonomy } }),
        };
    }

    let post_type = first_key(query.get("post_type")).unwrap_or_else(|| "post".to_string());
    let mut args = Map::new();
    args.insert("post_type".to_string(), json!(post_type));
    args.insert("posts_per_page".to_string(), json!(DEFAULT_LIMIT));
    args.insert("orderby".to_string(), json!("$orderby ?? 'date'"));
    args.insert("order".to_string(), json!("$order ?? 'DESC'"));
    let status = if post_type == "attachment" { "inherit" } else { "publish" };
    args.insert("post_status".to_string(), json!(status));

    if let Some(limit) = query
        .get("posts_per_page")
        .and_then(scalar)
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
    {
        args.insert("posts_per_page".to_string(), json!(limit));
    }

    let tax_query = tax_query(query);
    let has_tax_query = !tax_query.is_empty();
    if has_tax_query {
        args.insert("tax_query".to_string(), Value::Array(tax_query));
    }

    let default_posts = post_type == "post"
        && args.get("posts_per_page").and_then(Value::as_str) == Some(DEFAULT_LIMIT)
        && !has_tax_query;
    let preset_key = if default_posts {
        "posts".to_string()
    } else if has_tax_query {
        format!("posts_{}_tax", post_type)
    } else {
        format!("posts_{}", post_type)
    };

    NormalizedQuery {
        preset_key,
        config: json!({ "type": "wp-query", "args": Value::Object(args) }),
    }
}

fn tax_query(query: &Settings) -> Vec<Value> {
    let Some(rules) = query.get("tax_query_advanced").and_then(Value::as_array) else {
        return Vec::new();
    };
    rules
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|rule| {
            let taxonomy = rule.get("taxonomy").and_then(scalar).map(|t| sanitize_key(&t))?;
            if taxonomy.is_empty() {
                return None;
            }
            let field = rule
                .get("field")
                .and_then(scalar)
                .map(|f| sanitize_key(&f))
                .unwrap_or_else(|| "term_id".to_string());
            let operator = rule
                .get("operator")
                .and_then(scalar)
                .map(|o| o.trim().to_uppercase())
                .unwrap_or_else(|| "IN".to_string());
            let terms = rule.get("terms").and_then(scalar).unwrap_or_default();
            let terms = if terms.trim() == "{term_id}" {
                "$term_id ?? null".to_string()
            } else {
                terms
            };
            Some(json!({
                "taxonomy": taxonomy,
                "field": field,
                "terms": terms,
                "operator": operator,
            }))
        })
        .collect()
}

/// `Latest Posts (CSS)` → `latest-posts`.
pub fn derive_context_slug(label: &str) -> String {
    let cleaned = sanitize_label(label, "");
    let lowered = cleaned.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .collect();
    let dashed = kept.split_whitespace().collect::<Vec<_>>().join("-");
    dashed
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn query(value: Value) -> Settings {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_loop_query_requires_flag_and_object() {
        let settings = query(json!({ "hasLoop": true, "query": { "post_type": ["post"] } }));
        assert!(loop_query(&settings).is_some());
        assert!(loop_query(&query(json!({ "query": { "post_type": "post" } }))).is_none());
        assert!(loop_query(&query(json!({ "hasLoop": true, "query": "posts" }))).is_none());
    }

    #[test]
    fn test_rejected_types() {
        assert_eq!(rejected_query_type(&query(json!({ "type": "WooCommerce" }))).as_deref(), Some("woocommerce"));
        assert_eq!(rejected_query_type(&query(json!({ "type": "wc-products" }))).as_deref(), Some("wc-products"));
        assert_eq!(rejected_query_type(&query(json!({ "type": "posts" }))), None);
        assert_eq!(rejected_query_type(&query(json!({}))), None);
    }

    #[test]
    fn test_normalize_default_posts() {
        let normalized = normalize_loop_query(&query(json!({})));
        assert_eq!(normalized.preset_key, "posts");
        assert_eq!(
            normalized.config,
            json!({
                "type": "wp-query",
                "args": {
                    "post_type": "post",
                    "posts_per_page": "$limit ?? -1",
                    "orderby": "$orderby ?? 'date'",
                    "order": "$order ?? 'DESC'",
                    "post_status": "publish"
                }
            })
        );
    }

    #[test]
    fn test_normalize_attachments_with_taxonomy() {
        let normalized = normalize_loop_query(&query(json!({
            "post_type": ["attachment"],
            "posts_per_page": 6,
            "tax_query_advanced": [
                { "taxonomy": "Media_Cat", "terms": "{term_id}" },
                { "field": "slug" }
            ]
        })));
        assert_eq!(normalized.preset_key, "posts_attachment_tax");
        let args = &normalized.config["args"];
        assert_eq!(args["post_status"], "inherit");
        assert_eq!(args["posts_per_page"], "6");
        assert_eq!(
            args["tax_query"],
            json!([{ "taxonomy": "media_cat", "field": "term_id", "terms": "$term_id ?? null", "operator": "IN" }])
        );
    }

    #[test]
    fn test_normalize_terms() {
        let normalized = normalize_loop_query(&query(json!({ "objectType": "term", "taxonomy": ["post_tag"] })));
        assert_eq!(normalized.preset_key, "terms_post_tag");
        assert_eq!(normalized.config, json!({ "type": "wp-terms", "args": { "taxonomy": "post_tag" } }));
    }

    #[test]
    fn test_presets_reuse_identical_configs() {
        let mut presets = LoopPresets::new();
        let q = query(json!({ "post_type": "project" }));

        let first = presets.ensure(&q, Some("Project Grid"));
        let again = presets.ensure(&q, Some("Project Grid"));
        let other_context = presets.ensure(&q, None);

        assert_eq!(first, again);
        assert!(first.starts_with("project-grid_"));
        assert_eq!(first.len(), "project-grid_".len() + 8);
        assert!(other_context.starts_with("posts_project_"));
        assert_eq!(presets.len(), 2);
        assert_eq!(presets.get(&first).map(|p| p.key.as_str()), Some("posts_project"));
    }

    #[test]
    fn test_presets_persisted_by_an_earlier_run_are_reused() {
        let q = query(json!({ "post_type": "post", "posts_per_page": 3 }));
        let mut first_run = LoopPresets::new();
        let loop_id = first_run.ensure(&q, Some("Latest Posts"));

        let mut second_run = LoopPresets::from_existing(first_run.clone().into_inner());
        assert_eq!(second_run, first_run);
        assert_eq!(second_run.ensure(&q, Some("Latest Posts")), loop_id);
        assert_eq!(second_run.len(), 1);
    }

    #[test]
    fn test_context_slug_and_kind() {
        assert_eq!(derive_context_slug("Latest  Posts (CSS)"), "latest-posts");
        assert_eq!(derive_context_slug("--"), "");
        assert_eq!(query_kind(&query(json!({ "post_type": ["attachment"] }))), "attachment");
        assert_eq!(query_kind(&query(json!({ "objectType": "term" }))), "term");
    }
}
