//! Per-element styles: settings written directly on an element instance rather
//! than through a global class become `#etch-<id>` registry entries.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::{element_style_id, StyleEntry, StyleRegistry};
use crate::css::normalizer::convert_to_logical_properties;
use crate::css::stylesheet::{resolve_root_placeholder, wrap_for_breakpoint};
use crate::css::{BreakpointResolver, SettingsConverter};
use crate::document::SourceElement;

const CUSTOM_CSS_KEY: &str = "_cssCustom";

/// Accumulates id-scoped entries and the custom CSS written on elements.
pub struct ElementStyleCollector<'a> {
    breakpoints: &'a BreakpointResolver,
    collection: String,
    styles: StyleRegistry,
    custom_css: String,
}

impl<'a> ElementStyleCollector<'a> {
    pub fn new(breakpoints: &'a BreakpointResolver, collection: impl Into<String>) -> Self {
        Self {
            breakpoints,
            collection: collection.into(),
            styles: StyleRegistry::new(),
            custom_css: String::new(),
        }
    }

    pub fn collect_document(&mut self, elements: &[SourceElement]) {
        for element in elements.iter().filter(|e| !e.settings.is_empty()) {
            self.collect_element(element);
        }
    }

    pub fn collect_element(&mut self, element: &SourceElement) {
        if let Some(selector_id) = selector_id_for(&element.id) {
            self.accumulate_id_style(&selector_id, element);
        }
        if let Some(root) = root_selector_for(&element.id) {
            self.accumulate_custom_css(element, &root);
        }
    }

    fn accumulate_id_style(&mut self, selector_id: &str, element: &SourceElement) {
        let converter = SettingsConverter::new(self.breakpoints);
        let base = converter.convert(&element.settings, "", false);
        let responsive = converter.convert_responsive_variants(&element.settings, "");
        let combined = join_non_empty(base.trim(), responsive.trim());
        if combined.is_empty() {
            return;
        }
        let css = convert_to_logical_properties(&combined);

        let selector = format!("#{}", selector_id);
        let style_id = element_style_id(&selector);
        match self.styles.get_mut(&style_id) {
            Some(entry) => {
                entry.css = format!("{}\n  {}", entry.css.trim(), css).trim().to_string();
            }
            None => {
                log::trace!("element style {} for {}", style_id, selector);
                self.styles
                    .insert(style_id, StyleEntry::element(selector, self.collection.as_str(), css));
            }
        }
    }

    fn accumulate_custom_css(&mut self, element: &SourceElement, root: &str) {
        if let Some(Value::String(snippet)) = element.settings.get(CUSTOM_CSS_KEY) {
            if !snippet.is_empty() {
                self.custom_css
                    .push_str(&format!("\n{}\n", resolve_root_placeholder(snippet, root)));
            }
        }
        for (key, value) in &element.settings {
            let Some(breakpoint) = key.strip_prefix("_cssCustom:") else {
                continue;
            };
            let Some(snippet) = value.as_str().filter(|s| !s.trim().is_empty()) else {
                continue;
            };
            let snippet = resolve_root_placeholder(snippet, root);
            let wrapped = wrap_for_breakpoint(&snippet, breakpoint, self.breakpoints);
            self.custom_css.push_str(&format!("\n{}\n", wrapped));
        }
    }

    pub fn styles(&self) -> &StyleRegistry {
        &self.styles
    }

    pub fn custom_css(&self) -> &str {
        &self.custom_css
    }

    pub fn finish(self) -> (StyleRegistry, String) {
        (self.styles, self.custom_css)
    }
}

fn join_non_empty(base: &str, responsive: &str) -> String {
    match (base.is_empty(), responsive.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => responsive.to_string(),
        (false, false) => format!("{} {}", base, responsive),
    }
}

/// Target selector id of an element: `brxe-abc` and `abc` both become `etch-abc`.
pub fn selector_id_for(element_id: &str) -> Option<String> {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();

    let raw = element_id.trim().trim_start_matches('#');
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("etch-") {
        return Some(raw.to_string());
    }
    if let Some(rest) = raw.strip_prefix("brxe-") {
        return Some(format!("etch-{}", rest));
    }
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_-]").unwrap());
    let normalized = re.replace_all(raw, "");
    let normalized = normalized.trim();
    (!normalized.is_empty()).then(|| format!("etch-{}", normalized))
}

/// Selector the source builder used for `%root%` in element custom CSS.
pub fn root_selector_for(element_id: &str) -> Option<String> {
    let raw = element_id.trim().trim_start_matches('#');
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("brxe-") {
        return Some(format!("#{}", raw));
    }
    if let Some(rest) = raw.strip_prefix("etch-") {
        return Some(format!("#brxe-{}", rest));
    }
    Some(format!("#brxe-{}", raw))
}
