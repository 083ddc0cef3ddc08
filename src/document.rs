//! Source document parsing: raw node array → typed element records and the
//! id index the converters walk.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::css::settings::scalar;
use crate::css::Settings;
use crate::error::{EngineError, EngineResult};

/// Parent id of top-level nodes.
pub const ROOT_PARENT: &str = "0";

const KNOWN_KEYS: &[&str] = &[
    "id",
    "type",
    "name",
    "parentId",
    "parent",
    "childIds",
    "children",
    "settings",
    "inlineContent",
    "content",
    "label",
];

/// One node of the source document, read-only after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceElement {
    pub id: String,
    /// Element type, e.g. `section`, `heading`, `image`.
    #[serde(rename = "type")]
    pub kind: String,
    pub parent_id: String,
    pub child_ids: Vec<String>,
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Top-level node keys beyond the ones above (`cid`, `properties`,
    /// `slotChildren` on component instances).
    #[serde(default, flatten)]
    pub extra: Settings,
}

impl SourceElement {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            parent_id: ROOT_PARENT.to_string(),
            child_ids: Vec::new(),
            settings: Settings::new(),
            inline_content: None,
            label: None,
            extra: Settings::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    pub fn with_children<I, S>(mut self, child_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.child_ids = child_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// A top-level key, falling back to the same key inside `settings`.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key).or_else(|| self.settings.get(key))
    }

    /// A string setting, if present.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }

    /// Lenient conversion from one raw node. Returns `None` when the node has
    /// no usable id or type.
    pub fn from_value(value: &Value) -> Option<Self> {
        let node = value.as_object()?;
        let field = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| node.get(*key))
                .find_map(scalar)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let id = field(&["id"])?;
        let kind = field(&["type", "name"])?;
        let parent_id = field(&["parentId", "parent"]).unwrap_or_else(|| ROOT_PARENT.to_string());

        let child_ids = ["childIds", "children"]
            .iter()
            .find_map(|key| node.get(*key).and_then(Value::as_array))
            .map(|items| {
                items
                    .iter()
                    .filter_map(scalar)
                    .filter(|child| !child.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let settings = match node.get("settings") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(encoded)) => serde_json::from_str::<Settings>(encoded).unwrap_or_default(),
            _ => Settings::new(),
        };

        let inline_content = ["inlineContent", "content"]
            .iter()
            .find_map(|key| node.get(*key).and_then(scalar));
        let label = node.get("label").and_then(scalar).filter(|l| !l.trim().is_empty());
        let extra = node
            .iter()
            .filter(|(key, _)| !KNOWN_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Some(Self {
            id,
            kind,
            parent_id,
            child_ids,
            settings,
            inline_content,
            label,
            extra,
        })
    }
}

/// Parse a serialized document. Nodes without id or type are dropped, as are
/// later duplicates of an id already seen.
pub fn parse_document(json: &str) -> EngineResult<Vec<SourceElement>> {
    let value: Value = serde_json::from_str(json)?;
    parse_document_value(&value)
}

/// Like [`parse_document`], for an already decoded value. Accepts either the
/// node array itself or an object wrapping it under `content`/`elements`.
pub fn parse_document_value(value: &Value) -> EngineResult<Vec<SourceElement>> {
    let nodes = match value {
        Value::Array(nodes) => nodes,
        Value::Object(map) => ["content", "elements"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .ok_or_else(|| EngineError::InvalidDocument {
                reason: "expected an array of elements".to_string(),
            })?,
        _ => {
            return Err(EngineError::InvalidDocument {
                reason: "expected an array of elements".to_string(),
            })
        }
    };

    let mut seen = std::collections::HashSet::new();
    let mut elements = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Some(element) = SourceElement::from_value(node) else {
            log::trace!("dropping node without id or type");
            continue;
        };
        if !seen.insert(element.id.clone()) {
            log::debug!("dropping duplicate element id {}", element.id);
            continue;
        }
        elements.push(element);
    }
    log::debug!("parsed {} of {} source nodes", elements.len(), nodes.len());
    Ok(elements)
}

// ─── Element index ───────────────────────────────────────────────────────────

/// Id → node map over one document, plus its top-level ids in source order
/// and a parent id → children index for nodes without a child list.
#[derive(Debug, Clone)]
pub struct ElementTree<'a> {
    nodes: IndexMap<&'a str, &'a SourceElement>,
    roots: Vec<&'a str>,
    by_parent: IndexMap<&'a str, Vec<&'a SourceElement>>,
}

impl<'a> ElementTree<'a> {
    pub fn new(elements: &'a [SourceElement]) -> Self {
        let mut nodes = IndexMap::with_capacity(elements.len());
        for element in elements {
            nodes.entry(element.id.as_str()).or_insert(element);
        }

        let roots = nodes
            .values()
            .filter(|element| {
                let parent = element.parent_id.as_str();
                parent.is_empty()
                    || parent == ROOT_PARENT
                    || parent == element.id
                    || !nodes.contains_key(parent)
            })
            .map(|element| element.id.as_str())
            .collect();

        let mut by_parent: IndexMap<&'a str, Vec<&'a SourceElement>> = IndexMap::new();
        for element in nodes.values().copied() {
            let parent = element.parent_id.as_str();
            if !parent.is_empty() && parent != element.id {
                by_parent.entry(parent).or_default().push(element);
            }
        }

        Self { nodes, roots, by_parent }
    }

    pub fn get(&self, id: &str) -> Option<&'a SourceElement> {
        self.nodes.get(id).copied()
    }

    pub fn roots(&self) -> impl Iterator<Item = &'a SourceElement> + '_ {
        self.roots.iter().filter_map(|id| self.get(id))
    }

    /// Children of `element` in declared order. Ids that do not resolve are
    /// skipped. Nodes without a child list fall back to the nodes naming them
    /// as parent.
    pub fn children(&self, element: &SourceElement) -> Vec<&'a SourceElement> {
        if element.child_ids.is_empty() {
            return self.by_parent.get(element.id.as_str()).cloned().unwrap_or_default();
        }
        element
            .child_ids
            .iter()
            .filter(|id| id.as_str() != element.id)
            .filter_map(|id| {
                let child = self.get(id);
                if child.is_none() {
                    log::trace!("child {} of {} not found", id, element.id);
                }
                child
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_defaults_and_aliases() {
        let json = r#"[
            {"id": "a1", "name": "section", "parent": 0, "children": ["b2"]},
            {"id": "b2", "type": "heading", "parentId": "a1", "settings": "{\"text\":\"Hi\"}", "label": "Title"},
            {"id": 7, "name": "text", "content": "raw"}
        ]"#;
        let elements = parse_document(json).unwrap();

        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].parent_id, "0");
        assert_eq!(elements[0].child_ids, vec!["b2".to_string()]);
        assert_eq!(elements[1].kind, "heading");
        assert_eq!(elements[1].setting_str("text"), Some("Hi"));
        assert_eq!(elements[1].label.as_deref(), Some("Title"));
        assert_eq!(elements[2].id, "7");
        assert_eq!(elements[2].inline_content.as_deref(), Some("raw"));
        assert!(elements[2].settings.is_empty());
        assert!(elements[0].extra.is_empty());
    }

    #[test]
    fn test_parse_keeps_extra_keys() {
        let json = r#"[{"id": "t1", "name": "template", "cid": "hero", "settings": {"properties": {"a": 1}}}]"#;
        let elements = parse_document(json).unwrap();
        assert_eq!(elements[0].field("cid").and_then(Value::as_str), Some("hero"));
        assert!(elements[0].field("properties").is_some());
        assert!(elements[0].field("missing").is_none());
    }

    #[test]
    fn test_parse_drops_incomplete_and_duplicate_nodes() {
        let json = r#"[
            {"id": "a", "name": "div"},
            {"name": "div"},
            {"id": "b"},
            {"id": "a", "name": "heading"},
            {"id": "c", "name": "text", "settings": "not json"}
        ]"#;
        let elements = parse_document(json).unwrap();
        let ids: Vec<_> = elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(elements[0].kind, "div");
        assert!(elements[1].settings.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(matches!(
            parse_document("\"text\""),
            Err(EngineError::InvalidDocument { .. })
        ));
        assert!(matches!(parse_document("[unclosed"), Err(EngineError::InvalidJson(_))));
        assert_eq!(parse_document(r#"{"content": []}"#).unwrap(), Vec::new());
    }

    #[test]
    fn test_tree_roots_and_children() {
        let elements = vec![
            SourceElement::new("s", "section").with_children(["c", "missing"]),
            SourceElement::new("c", "container").with_parent("s"),
            SourceElement::new("orphan", "div").with_parent("gone"),
            SourceElement::new("p", "text").with_parent("orphan"),
        ];
        let tree = ElementTree::new(&elements);

        let roots: Vec<_> = tree.roots().map(|e| e.id.as_str()).collect();
        assert_eq!(roots, vec!["s", "orphan"]);

        let children: Vec<_> = tree.children(&elements[0]).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(children, vec!["c"]);

        let fallback: Vec<_> = tree.children(&elements[2]).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(fallback, vec!["p"]);
    }

    #[test]
    fn test_parent_index_keeps_source_order() {
        let elements = vec![
            SourceElement::new("b", "text").with_parent("root"),
            SourceElement::new("root", "div"),
            SourceElement::new("self", "div").with_parent("self"),
            SourceElement::new("a", "text").with_parent("root"),
        ];
        let tree = ElementTree::new(&elements);

        let children: Vec<_> = tree.children(&elements[1]).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(children, vec!["b", "a"]);
        assert!(tree.children(&elements[2]).is_empty());
        assert!(tree.children(&elements[0]).is_empty());
    }
}
