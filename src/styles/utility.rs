//! Utility-framework (Automatic.css) classes.
//!
//! These classes are not migrated as selectors of their own. Their declarations
//! are looked up in the framework stylesheet and kept in an inline map, and each
//! distinct utility name gets one stub registry entry that every source class
//! with that name maps to.

use indexmap::IndexMap;
use regex::Regex;

use super::{class_style_id, StyleClass, StyleEntry, StyleMap, StyleMapEntry, StyleRegistry};
use crate::css::normalizer::normalize_hsl_tokens;

/// Name prefix of classes imported from the utility framework.
pub const IMPORT_PREFIX: &str = "acss_import_";

const UTILITY_CATEGORY: &str = "acss";

#[derive(Debug, Clone, Default)]
pub struct UtilityHandler {
    stylesheet: String,
    inline_styles: IndexMap<String, String>,
    /// Lowercased normalized name → stub style id.
    stubs: IndexMap<String, String>,
    cache: IndexMap<String, String>,
}

impl UtilityHandler {
    pub fn new(stylesheet: impl Into<String>) -> Self {
        Self {
            stylesheet: stylesheet.into(),
            ..Self::default()
        }
    }

    pub fn is_utility_class(class: &StyleClass) -> bool {
        class
            .category
            .as_deref()
            .map(|c| c.trim().eq_ignore_ascii_case(UTILITY_CATEGORY))
            .unwrap_or(false)
            || class.name.trim().starts_with(IMPORT_PREFIX)
    }

    /// `acss_import_.fr-card` → `card`.
    pub fn normalized_name(name: &str) -> String {
        let name = name.trim();
        let name = name.strip_prefix(IMPORT_PREFIX).unwrap_or(name);
        let name = name.trim_start_matches('.');
        name.strip_prefix("fr-").unwrap_or(name).to_string()
    }

    /// Declarations of `.name { … }` in the framework stylesheet, hsl tokens
    /// repaired. Empty when the class is not defined there.
    pub fn declarations_for(&mut self, name: &str) -> String {
        if let Some(cached) = self.cache.get(name) {
            return cached.clone();
        }
        let declarations = if self.stylesheet.is_empty() {
            String::new()
        } else {
            let pattern = format!(r"\.{}\s*\{{([^}}]*)\}}", regex::escape(name));
            Regex::new(&pattern)
                .ok()
                .and_then(|re| re.captures(&self.stylesheet).map(|caps| caps[1].trim().to_string()))
                .map(|decls| normalize_hsl_tokens(&decls))
                .unwrap_or_default()
        };
        self.cache.insert(name.to_string(), declarations.clone());
        declarations
    }

    /// Record the inline declarations of a utility class under its id, its
    /// normalized name and its raw name.
    pub fn register_inline_style(&mut self, class: &StyleClass) {
        let name = class.name.trim();
        if name.is_empty() {
            return;
        }
        let normalized = Self::normalized_name(name);
        if normalized.is_empty() {
            return;
        }
        let declarations = self.declarations_for(&normalized);
        if declarations.is_empty() {
            return;
        }
        let id = class.id.trim();
        if !id.is_empty() {
            self.inline_styles.insert(id.to_string(), declarations.clone());
        }
        self.inline_styles.insert(normalized, declarations.clone());
        self.inline_styles.insert(name.to_string(), declarations);
    }

    /// Point `class` at the stub entry for its utility name, creating the stub
    /// on first sight. Returns the stub's style id.
    pub fn register_stub(
        &mut self,
        class: &StyleClass,
        collection: &str,
        registry: &mut StyleRegistry,
        style_map: &mut StyleMap,
    ) -> Option<String> {
        let raw = if class.name.trim().is_empty() { &class.id } else { &class.name };
        let normalized = Self::normalized_name(raw);
        if normalized.is_empty() {
            return None;
        }
        let key = normalized.to_lowercase();
        let selector = format!(".{}", normalized);

        let style_id = match self.stubs.get(&key) {
            Some(existing) => existing.clone(),
            None => {
                let style_id = class_style_id(&key, &selector);
                let css = self.declarations_for(&normalized);
                registry.insert(style_id.clone(), StyleEntry::class(selector.clone(), collection, css));
                self.stubs.insert(key, style_id.clone());
                log::trace!("utility stub {} for {}", style_id, selector);
                style_id
            }
        };

        let stub_selector = registry
            .get(&style_id)
            .map(|entry| entry.selector.clone())
            .unwrap_or(selector);
        if !class.id.trim().is_empty() {
            style_map.insert(
                class.id.trim().to_string(),
                StyleMapEntry {
                    id: style_id.clone(),
                    selector: stub_selector,
                },
            );
        }
        Some(style_id)
    }

    pub fn inline_styles(&self) -> &IndexMap<String, String> {
        &self.inline_styles
    }

    pub fn into_inline_styles(self) -> IndexMap<String, String> {
        self.inline_styles
    }
}
