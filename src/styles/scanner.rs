//! Which global classes the migrated content actually references.

use indexmap::IndexSet;
use serde_json::Value;

use super::utility::IMPORT_PREFIX;
use super::StyleClass;
use crate::css::settings::scalar;
use crate::document::SourceElement;

const GLOBAL_CLASSES_KEY: &str = "_cssGlobalClasses";
const CLASS_NAMES_KEY: &str = "_cssClasses";

/// Collects class ids and names referenced by element settings.
#[derive(Debug, Clone)]
pub struct ClassReferenceScanner {
    max_depth: usize,
    referenced: IndexSet<String>,
    scanned_content: bool,
}

impl Default for ClassReferenceScanner {
    fn default() -> Self {
        Self::new(8)
    }
}

impl ClassReferenceScanner {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            referenced: IndexSet::new(),
            scanned_content: false,
        }
    }

    /// Scan every element of one document.
    pub fn scan_document(&mut self, elements: &[SourceElement]) {
        self.scanned_content = true;
        for element in elements {
            self.scan_settings_value(&Value::Object(element.settings.clone()), 0);
        }
    }

    /// Scan a page- or template-level settings payload.
    pub fn scan_value(&mut self, value: &Value) -> bool {
        self.scan_settings_value(value, 0)
    }

    pub fn referenced(&self) -> &IndexSet<String> {
        &self.referenced
    }

    pub fn has_scanned_content(&self) -> bool {
        self.scanned_content
    }

    /// Whether `class` should be migrated. With no references at all, every
    /// class passes unless content was actually scanned.
    pub fn is_referenced(&self, class: &StyleClass) -> bool {
        if self.referenced.is_empty() {
            return !self.scanned_content;
        }
        let id = class.id.trim();
        let name = class.name.trim();
        (!id.is_empty() && self.referenced.contains(id))
            || (!name.is_empty()
                && (self.referenced.contains(name)
                    || self.referenced.contains(&format!("{}{}", IMPORT_PREFIX, name))))
    }

    fn scan_settings_value(&mut self, value: &Value, depth: usize) -> bool {
        if depth > self.max_depth {
            return false;
        }

        let decoded;
        let value = match value {
            Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
                Ok(inner @ (Value::Array(_) | Value::Object(_))) => {
                    decoded = inner;
                    &decoded
                }
                _ => return false,
            },
            other => other,
        };

        let mut found = false;
        match value {
            Value::Object(settings) => {
                if let Some(globals) = settings.get(GLOBAL_CLASSES_KEY) {
                    found |= self.collect_global_ids(globals);
                }
                if let Some(names) = settings.get(CLASS_NAMES_KEY) {
                    found |= self.collect_class_names(names);
                }
                for (key, nested) in settings {
                    if key == GLOBAL_CLASSES_KEY || key == CLASS_NAMES_KEY {
                        continue;
                    }
                    if matches!(nested, Value::Array(_) | Value::Object(_) | Value::String(_)) {
                        found |= self.scan_settings_value(nested, depth + 1);
                    }
                }
            }
            Value::Array(items) => {
                for nested in items {
                    if matches!(nested, Value::Array(_) | Value::Object(_) | Value::String(_)) {
                        found |= self.scan_settings_value(nested, depth + 1);
                    }
                }
            }
            _ => {}
        }
        found
    }

    fn collect_global_ids(&mut self, value: &Value) -> bool {
        let ids: Vec<String> = match value {
            Value::Array(items) => items.iter().filter_map(scalar).collect(),
            other => scalar(other).into_iter().collect(),
        };
        let mut found = false;
        for id in ids {
            let id = id.trim();
            if !id.is_empty() {
                self.referenced.insert(id.to_string());
                found = true;
            }
        }
        found
    }

    fn collect_class_names(&mut self, value: &Value) -> bool {
        let raw: Vec<String> = match value {
            Value::Array(items) => items.iter().filter_map(scalar).collect(),
            other => scalar(other).into_iter().collect(),
        };
        let mut found = false;
        for name in raw.iter().flat_map(|entry| entry.split_whitespace()) {
            self.referenced.insert(name.to_string());
            found = true;
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::Settings;
    use serde_json::json;

    fn element(settings: Value) -> SourceElement {
        let settings: Settings = serde_json::from_value(settings).unwrap();
        SourceElement::new("e1", "div").with_settings(settings)
    }

    #[test]
    fn test_collects_globals_and_names() {
        let mut scanner = ClassReferenceScanner::default();
        scanner.scan_document(&[element(json!({
            "_cssGlobalClasses": ["abc", "def"],
            "_cssClasses": "card  card--wide"
        }))]);

        let referenced: Vec<_> = scanner.referenced().iter().cloned().collect();
        assert_eq!(referenced, vec!["abc", "def", "card", "card--wide"]);
    }

    #[test]
    fn test_recurses_into_nested_and_encoded_values() {
        let mut scanner = ClassReferenceScanner::default();
        let found = scanner.scan_value(&json!({
            "items": [{ "_cssGlobalClasses": "nested" }],
            "encoded": "{\"_cssClasses\":[\"from-json\"]}"
        }));

        assert!(found);
        assert!(scanner.referenced().contains("nested"));
        assert!(scanner.referenced().contains("from-json"));
    }

    #[test]
    fn test_depth_limit_stops_recursion() {
        let mut scanner = ClassReferenceScanner::new(1);
        scanner.scan_value(&json!({ "a": { "b": { "_cssGlobalClasses": ["deep"] } } }));
        assert!(scanner.referenced().is_empty());
    }

    #[test]
    fn test_is_referenced_fallbacks() {
        let class = StyleClass::new("id1", "card", Settings::new());

        let fresh = ClassReferenceScanner::default();
        assert!(fresh.is_referenced(&class));

        let mut empty_scan = ClassReferenceScanner::default();
        empty_scan.scan_document(&[]);
        assert!(!empty_scan.is_referenced(&class));

        let mut by_import = ClassReferenceScanner::default();
        by_import.scan_document(&[element(json!({ "_cssClasses": "acss_import_card" }))]);
        assert!(by_import.is_referenced(&class));
        assert!(!by_import.is_referenced(&StyleClass::new("x", "other", Settings::new())));
    }
}
