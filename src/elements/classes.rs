//! Class references on a node → style ids and the `class` attribute.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::css::settings::scalar;
use crate::css::Settings;
use crate::styles::{is_framework_style, StyleConversion};

/// Class names never written to the `class` attribute.
const UNTRANSFERRED_CLASSES: &[&str] = &["fr-lede", "fr-intro", "fr-note", "fr-notes", "text--l"];

/// Resolved style references of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedClasses {
    pub style_ids: Vec<String>,
    pub class_names: String,
    /// Source class ids that resolved, in reference order.
    pub source_ids: Vec<String>,
}

/// Push `id` unless already present, keeping first occurrence order.
pub(crate) fn push_unique(ids: &mut Vec<String>, id: &str) {
    let id = id.trim();
    if !id.is_empty() && !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
    }
}

/// Global class ids first, then `_cssClasses` names, in declaration order.
pub fn resolve_classes(settings: &Settings, styles: &StyleConversion) -> ResolvedClasses {
    let mut resolved = ResolvedClasses::default();

    for class_id in string_list(settings.get("_cssGlobalClasses")) {
        if let Some(mapped) = styles.for_class_id(&class_id) {
            push_unique(&mut resolved.style_ids, &mapped.id);
            push_unique(&mut resolved.source_ids, &class_id);
        }
    }

    let names = string_list(settings.get("_cssClasses"));
    for name in names.iter().flat_map(|entry| entry.split_whitespace()) {
        let Some(class_id) = styles.class_ids_by_name.get(name) else {
            continue;
        };
        if let Some(mapped) = styles.for_class_id(class_id) {
            push_unique(&mut resolved.style_ids, &mapped.id);
            push_unique(&mut resolved.source_ids, class_id);
        }
    }

    resolved.class_names = class_names_for(&resolved.style_ids, styles);
    resolved
}

/// Attribute-level class string for a list of style ids.
pub fn class_names_for(style_ids: &[String], styles: &StyleConversion) -> String {
    let names: Vec<String> = style_ids
        .iter()
        .filter(|id| !is_framework_style(id))
        .filter_map(|id| selector_for(id, styles))
        .filter_map(|selector| class_from_selector(&selector))
        .collect();
    merge_class_names(&[names.join(" ").as_str()])
}

fn selector_for(style_id: &str, styles: &StyleConversion) -> Option<String> {
    if let Some(entry) = styles.entry(style_id) {
        return Some(entry.selector.clone());
    }
    styles
        .style_map
        .values()
        .find(|mapped| mapped.id == style_id)
        .map(|mapped| mapped.selector.clone())
}

/// `.card:hover` → `card`; id selectors yield nothing.
pub fn class_from_selector(selector: &str) -> Option<String> {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    let selector = selector.trim();
    let bare = selector.strip_prefix('.')?;
    let re = SUFFIX.get_or_init(|| Regex::new(r"[\[\]:\s>+~.,].*$").unwrap());
    let name = re.replace(bare, "");
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Join class sets, dropping duplicates and untransferred framework names.
pub fn merge_class_names(sets: &[&str]) -> String {
    let mut classes: Vec<String> = Vec::new();
    for name in sets.iter().flat_map(|set| set.split_whitespace()) {
        let bare = name.strip_prefix("acss_import_").unwrap_or(name);
        let bare = bare.trim_start_matches('.');
        if bare.is_empty() || UNTRANSFERRED_CLASSES.contains(&bare) {
            continue;
        }
        push_unique(&mut classes, name);
    }
    classes.join(" ")
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar).collect(),
        Some(other) => scalar(other).into_iter().collect(),
        None => Vec::new(),
    }
    .into_iter()
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styles::{StyleEntry, StyleMapEntry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn conversion() -> StyleConversion {
        let mut styles = StyleConversion::default();
        for (class_id, name, style_id, selector) in [
            ("g1", "card", "s1", ".card"),
            ("g2", "btn", "s2", ".btn:hover"),
            ("g3", "lede", "s3", ".fr-lede"),
        ] {
            styles
                .styles
                .insert(style_id.to_string(), StyleEntry::class(selector, "default", ""));
            styles.style_map.insert(
                class_id.to_string(),
                StyleMapEntry {
                    id: style_id.to_string(),
                    selector: selector.to_string(),
                },
            );
            styles.class_ids_by_name.insert(name.to_string(), class_id.to_string());
        }
        styles
    }

    #[test]
    fn test_globals_then_names_deduplicated() {
        let settings = json!({
            "_cssGlobalClasses": ["g2", "missing", "g1"],
            "_cssClasses": "card lede unknown"
        });
        let resolved = resolve_classes(settings.as_object().unwrap(), &conversion());

        assert_eq!(resolved.style_ids, vec!["s2", "s1", "s3"]);
        assert_eq!(resolved.source_ids, vec!["g2", "g1", "g3"]);
        assert_eq!(resolved.class_names, "btn card");
    }

    #[test]
    fn test_class_from_selector() {
        assert_eq!(class_from_selector(".card").as_deref(), Some("card"));
        assert_eq!(class_from_selector(".card[data-x]").as_deref(), Some("card"));
        assert_eq!(class_from_selector(".card > img").as_deref(), Some("card"));
        assert_eq!(class_from_selector("#etch-abc"), None);
    }

    #[test]
    fn test_merge_class_names() {
        assert_eq!(merge_class_names(&["a b", "b text--l c", "acss_import_fr-intro"]), "a b c");
        assert_eq!(merge_class_names(&["", "  "]), "");
    }
}
