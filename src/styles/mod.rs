//! # Style pipeline
//!
//! Turns the source site's global classes into the target style registry.
//!
//! - [`utility`]: utility-framework classes become shared stub entries plus an
//!   inline declaration map
//! - [`scanner`]: which classes the migrated content actually references
//! - [`element_styles`]: per-element (id-scoped) styles
//! - [`orchestrator`]: the single pass that produces a [`StyleConversion`]

pub mod element_styles;
pub mod orchestrator;
pub mod scanner;
pub mod utility;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::css::settings::scalar;
use crate::css::Settings;
use crate::error::{EngineError, EngineResult};

pub use element_styles::ElementStyleCollector;
pub use orchestrator::{convert_styles, StyleConversion, StylePatch, StyleSources, StyleStatus};
pub use scanner::ClassReferenceScanner;
pub use utility::UtilityHandler;

/// Registry keys starting with this prefix belong to built-in framework styles.
pub const FRAMEWORK_PREFIX: &str = "etch-";

// ─── Source records ──────────────────────────────────────────────────────────

/// One global class as exported by the source builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleClass {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl StyleClass {
    pub fn new(id: impl Into<String>, name: impl Into<String>, settings: Settings) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            settings,
            category: None,
        }
    }

    /// Lenient conversion from one raw JSON record. Returns `None` for anything
    /// that is not an object; numeric ids and names are stringified.
    pub fn from_value(value: &Value) -> Option<Self> {
        let record = value.as_object()?;
        let text = |key: &str| record.get(key).and_then(scalar).unwrap_or_default();
        let settings = match record.get("settings") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(encoded)) => serde_json::from_str::<Settings>(encoded).unwrap_or_default(),
            _ => Settings::new(),
        };
        let category = record.get("category").and_then(scalar).filter(|c| !c.is_empty());
        Some(Self {
            id: text("id"),
            name: text("name"),
            settings,
            category,
        })
    }

    /// Name used for the CSS selector: the class name, or its id when unnamed.
    pub fn selector_name(&self) -> &str {
        let name = if self.name.is_empty() { &self.id } else { &self.name };
        name.strip_prefix(utility::IMPORT_PREFIX).unwrap_or(name)
    }
}

/// Parse a JSON array of class records. Entries that are not objects are kept
/// as empty records so the orchestrator can report them as malformed.
pub fn parse_style_classes(json: &str) -> EngineResult<Vec<StyleClass>> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(items) = value else {
        return Err(EngineError::InvalidDocument {
            reason: "style classes must be a JSON array".to_string(),
        });
    };
    Ok(items
        .iter()
        .map(|item| StyleClass::from_value(item).unwrap_or_default())
        .collect())
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleKind {
    Class,
    Element,
}

/// One entry of the target style registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleEntry {
    #[serde(rename = "type")]
    pub kind: StyleKind,
    pub selector: String,
    pub collection: String,
    pub css: String,
    pub readonly: bool,
}

impl StyleEntry {
    pub fn class(selector: impl Into<String>, collection: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            kind: StyleKind::Class,
            selector: selector.into(),
            collection: collection.into(),
            css: css.into(),
            readonly: false,
        }
    }

    pub fn element(selector: impl Into<String>, collection: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            kind: StyleKind::Element,
            selector: selector.into(),
            collection: collection.into(),
            css: css.into(),
            readonly: false,
        }
    }

    /// Append a fragment after the current css, separated by `separator`.
    /// An empty entry takes the fragment as is.
    pub fn append_css(&mut self, separator: &str, fragment: &str) {
        if self.css.is_empty() {
            self.css = fragment.to_string();
        } else {
            self.css = format!("{}{}{}", self.css, separator, fragment);
        }
    }

    /// Whether the declarations declare `property` at the top level.
    pub fn declares(&self, property: &str) -> bool {
        self.css
            .split([';', '{', '}'])
            .filter_map(|decl| decl.split_once(':'))
            .any(|(name, _)| name.trim().eq_ignore_ascii_case(property))
    }
}

/// Target style registry, keyed by generated style id, in insertion order.
pub type StyleRegistry = IndexMap<String, StyleEntry>;

/// Where a source class ended up in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleMapEntry {
    pub id: String,
    pub selector: String,
}

/// Source class id → target style id. Never holds framework styles.
pub type StyleMap = IndexMap<String, StyleMapEntry>;

pub fn is_framework_style(style_id: &str) -> bool {
    style_id.starts_with(FRAMEWORK_PREFIX)
}

// ─── Ids ─────────────────────────────────────────────────────────────────────

/// First eight hex characters of the sha256 of `input`.
pub fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..8].to_string()
}

/// Registry id of a user class: stable across runs for the same class.
pub fn class_style_id(class_id: &str, selector: &str) -> String {
    short_hash(&format!("{}|{}", class_id, selector))
}

/// Registry id of an element-scoped style, derived from its `#etch-…` selector.
pub fn element_style_id(selector: &str) -> String {
    format!("id_{}", short_hash(selector))
}
