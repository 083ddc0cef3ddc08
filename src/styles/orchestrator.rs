//! The single style-conversion pass.
//!
//! States run in a fixed order and exactly once per call: seed framework
//! styles, collect custom CSS, convert classes, fold in element styles, merge
//! the custom stylesheet, append breakpoint fragments, normalize. After the
//! convert state every entry's CSS only ever grows.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::element_styles::ElementStyleCollector;
use super::scanner::ClassReferenceScanner;
use super::utility::UtilityHandler;
use super::{
    class_style_id, element_style_id, is_framework_style, StyleClass, StyleEntry, StyleKind, StyleMap,
    StyleMapEntry, StyleRegistry,
};
use crate::config::EngineConfig;
use crate::css::normalizer::{
    convert_to_logical_properties, move_image_fit_to_nested_img, normalize_css_variables,
    normalize_final_css, validate_css_syntax,
};
use crate::css::stylesheet::{extract_declaration_block, resolve_root_placeholder, SelectorKind};
use crate::css::{parse_class_rules, parse_id_rules, BreakpointResolver, SettingsConverter};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::SourceElement;

/// Everything the style pass reads.
#[derive(Debug, Clone, Default)]
pub struct StyleSources {
    pub classes: Vec<StyleClass>,
    /// Documents being migrated, for reference scanning and element styles.
    pub documents: Vec<Vec<SourceElement>>,
    /// Page- and template-level settings that may reference classes.
    pub page_settings: Vec<Value>,
    /// Site-wide custom stylesheet.
    pub custom_css: String,
    /// The utility framework's compiled stylesheet.
    pub utility_css: String,
    /// CSS extracted from code elements by earlier document conversions.
    pub inline_css: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleStatus {
    Converted,
    /// Nothing beyond the framework styles was produced.
    Empty,
}

/// Output of one style pass, shared read-only by document conversions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleConversion {
    pub styles: StyleRegistry,
    pub style_map: StyleMap,
    /// Source class name → source class id, for `_cssClasses` lookups.
    pub class_ids_by_name: IndexMap<String, String>,
    /// Utility-class declarations keyed by class id and name.
    pub inline_styles: IndexMap<String, String>,
    /// Source class ids that map to a utility stub.
    #[serde(default)]
    pub utility_classes: IndexSet<String>,
    pub status: StyleStatus,
    pub diagnostics: Diagnostics,
}

impl Default for StyleConversion {
    fn default() -> Self {
        Self {
            styles: StyleRegistry::new(),
            style_map: StyleMap::new(),
            class_ids_by_name: IndexMap::new(),
            inline_styles: IndexMap::new(),
            utility_classes: IndexSet::new(),
            status: StyleStatus::Empty,
            diagnostics: Diagnostics::new(),
        }
    }
}

/// Prepend `css` to a registry entry once conversion is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePatch {
    pub style_id: String,
    pub css: String,
}

impl StyleConversion {
    pub fn entry(&self, style_id: &str) -> Option<&StyleEntry> {
        self.styles.get(style_id)
    }

    /// Style map entry for a global class id.
    pub fn for_class_id(&self, class_id: &str) -> Option<&StyleMapEntry> {
        self.style_map.get(class_id)
    }

    /// Style map entry for a class referenced by name.
    pub fn for_class_name(&self, name: &str) -> Option<&StyleMapEntry> {
        self.class_ids_by_name
            .get(name)
            .and_then(|id| self.style_map.get(id))
    }

    /// Apply prepend patches produced by document conversion. A patch whose
    /// declarations are already present is skipped.
    pub fn apply_patches(&mut self, patches: &[StylePatch]) {
        for patch in patches {
            let Some(entry) = self.styles.get_mut(&patch.style_id) else {
                continue;
            };
            if entry.css.trim_start().starts_with(patch.css.trim()) {
                continue;
            }
            entry.css = if entry.css.trim().is_empty() {
                patch.css.clone()
            } else {
                format!("{} {}", patch.css, entry.css)
            };
        }
    }
}

/// Run the style pass over `sources`.
pub fn convert_styles(sources: &StyleSources, config: &EngineConfig) -> StyleConversion {
    StylePass::new(config, sources).run()
}

struct StylePass<'a> {
    config: &'a EngineConfig,
    sources: &'a StyleSources,
    breakpoints: BreakpointResolver,
    utility: UtilityHandler,
    scanner: Option<ClassReferenceScanner>,
    styles: StyleRegistry,
    style_map: StyleMap,
    stylesheet: String,
    /// Source class id → media blocks from `_cssCustom:<bp>`.
    breakpoint_css: IndexMap<String, Vec<String>>,
    utility_classes: IndexSet<String>,
    diagnostics: Diagnostics,
}

impl<'a> StylePass<'a> {
    fn new(config: &'a EngineConfig, sources: &'a StyleSources) -> Self {
        let scanner = config.restrict_to_referenced.then(|| {
            let mut scanner = ClassReferenceScanner::new(config.max_scan_depth);
            for document in &sources.documents {
                scanner.scan_document(document);
            }
            for settings in &sources.page_settings {
                scanner.scan_value(settings);
            }
            log::debug!("{} class references found", scanner.referenced().len());
            scanner
        });

        Self {
            config,
            sources,
            breakpoints: BreakpointResolver::new(&config.breakpoints),
            utility: UtilityHandler::new(sources.utility_css.as_str()),
            scanner,
            styles: StyleRegistry::new(),
            style_map: StyleMap::new(),
            stylesheet: String::new(),
            breakpoint_css: IndexMap::new(),
            utility_classes: IndexSet::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    fn run(mut self) -> StyleConversion {
        log::debug!("converting {} style classes", self.sources.classes.len());

        self.seed_framework_styles();
        self.collect_custom_css();
        self.convert_classes();
        self.fold_element_styles();
        self.merge_custom_stylesheet();
        self.append_breakpoint_css();
        self.normalize_entries();

        let produced = self.styles.keys().filter(|id| !is_framework_style(id)).count();
        let status = if produced == 0 {
            self.diagnostics.report(
                DiagnosticKind::EmptyStyleRegistry,
                format!("no styles produced from {} classes", self.sources.classes.len()),
            );
            StyleStatus::Empty
        } else {
            StyleStatus::Converted
        };
        log::debug!(
            "style pass done: {} entries, {} mapped classes",
            self.styles.len(),
            self.style_map.len()
        );

        let mut class_ids_by_name: IndexMap<String, String> = IndexMap::new();
        for class in &self.sources.classes {
            if class.name.is_empty() || class.id.is_empty() {
                continue;
            }
            for name in [class.name.as_str(), class.selector_name()] {
                class_ids_by_name
                    .entry(name.to_string())
                    .or_insert_with(|| class.id.clone());
            }
        }

        StyleConversion {
            styles: self.styles,
            style_map: self.style_map,
            class_ids_by_name,
            inline_styles: self.utility.into_inline_styles(),
            utility_classes: self.utility_classes,
            status,
            diagnostics: self.diagnostics,
        }
    }

    // ─── States ──────────────────────────────────────────────────────────────

    fn seed_framework_styles(&mut self) {
        for framework in &self.config.framework_styles {
            self.styles.insert(
                framework.id.clone(),
                StyleEntry {
                    kind: StyleKind::Element,
                    selector: framework.selector.clone(),
                    collection: self.config.collection.clone(),
                    css: framework.css.clone(),
                    readonly: true,
                },
            );
        }
    }

    fn collect_custom_css(&mut self) {
        let sources = self.sources;
        for class in &sources.classes {
            if class.id.trim().is_empty() && class.name.trim().is_empty() {
                self.diagnostics
                    .report(DiagnosticKind::MalformedClass, "class record without id or name");
                continue;
            }
            if !self.is_referenced(class) {
                continue;
            }
            if UtilityHandler::is_utility_class(class) {
                self.utility.register_inline_style(class);
                continue;
            }
            if self.config.is_excluded_class(&class.name) {
                continue;
            }

            let name = class.selector_name().to_string();
            let root = format!(".{}", name);

            if let Some(Value::String(custom)) = class.settings.get("_cssCustom") {
                if !custom.is_empty() {
                    let snippet = resolve_root_placeholder(custom, &root);
                    self.stylesheet.push_str(&format!("\n{}\n", snippet));
                }
            }

            for (key, value) in &class.settings {
                let Some(breakpoint) = key.strip_prefix("_cssCustom:") else {
                    continue;
                };
                let Some(custom) = value.as_str().filter(|v| !v.is_empty()) else {
                    continue;
                };
                let Some(media) = self.breakpoints.media_query_for(breakpoint) else {
                    continue;
                };
                let snippet = resolve_root_placeholder(custom, &root);
                if let Some(body) = extract_declaration_block(&snippet, SelectorKind::Class, &name) {
                    log::trace!("breakpoint css for .{} at {}", name, breakpoint);
                    self.breakpoint_css
                        .entry(class.id.clone())
                        .or_default()
                        .push(format!("{} {{\n  {}\n}}", media, body));
                }
            }
        }

        for inline in &sources.inline_css {
            self.stylesheet.push_str(&format!("\n{}\n", inline));
        }
        if !sources.custom_css.trim().is_empty() {
            self.stylesheet.push_str(&format!("\n{}\n", sources.custom_css));
        }
    }

    fn convert_classes(&mut self) {
        let sources = self.sources;
        let converter = SettingsConverter::new(&self.breakpoints);
        let mut converted = 0usize;

        for class in &sources.classes {
            if class.id.trim().is_empty() && class.name.trim().is_empty() {
                continue;
            }
            if !self.is_referenced(class) {
                continue;
            }
            if UtilityHandler::is_utility_class(class) {
                let stub = self
                    .utility
                    .register_stub(class, &self.config.collection, &mut self.styles, &mut self.style_map);
                if stub.is_some() && !class.id.trim().is_empty() {
                    self.utility_classes.insert(class.id.trim().to_string());
                }
                continue;
            }
            if self.config.is_excluded_class(&class.name) {
                log::trace!("excluding class {}", class.name);
                continue;
            }

            let name = class.selector_name().to_string();
            let selector = format!(".{}", name);
            let base = converter.convert(&class.settings, &name, true);
            let responsive = converter.convert_responsive_variants(&class.settings, &name);
            let css = normalize_css_variables(&format!("{} {}", base, responsive));
            let css = move_image_fit_to_nested_img(&name, css.trim());

            let style_id = class_style_id(&class.id, &selector);
            self.styles.insert(
                style_id.clone(),
                StyleEntry::class(selector.clone(), self.config.collection.as_str(), css),
            );
            if !class.id.is_empty() {
                self.style_map.insert(
                    class.id.clone(),
                    StyleMapEntry {
                        id: style_id,
                        selector,
                    },
                );
            }
            converted += 1;
        }
        log::debug!("converted {} classes", converted);
    }

    fn fold_element_styles(&mut self) {
        let mut collector = ElementStyleCollector::new(&self.breakpoints, self.config.collection.as_str());
        for document in &self.sources.documents {
            collector.collect_document(document);
        }
        let (element_styles, custom_css) = collector.finish();

        for (style_id, entry) in element_styles {
            match self.styles.get_mut(&style_id) {
                Some(existing) => {
                    let css = entry.css.trim();
                    if !css.is_empty() {
                        let merged = if existing.css.trim().is_empty() {
                            css.to_string()
                        } else {
                            format!("{}\n  {}", existing.css.trim(), css)
                        };
                        existing.css = merged;
                    }
                }
                None => {
                    self.styles.insert(style_id, entry);
                }
            }
        }
        if !custom_css.is_empty() {
            self.stylesheet.push_str(&format!("\n{}\n", custom_css));
        }
    }

    fn merge_custom_stylesheet(&mut self) {
        if self.stylesheet.trim().is_empty() {
            return;
        }
        log::debug!("parsing {} bytes of custom css", self.stylesheet.len());

        let mut custom: Vec<(String, StyleEntry)> = Vec::new();
        for rule in parse_class_rules(&self.stylesheet) {
            let mapped = self
                .style_map
                .values()
                .find(|entry| entry.selector == rule.selector || entry.selector == rule.name);
            let Some(mapped) = mapped else {
                log::trace!("custom css for {} has no mapped class", rule.selector);
                continue;
            };
            custom.push((
                mapped.id.clone(),
                StyleEntry::class(rule.selector, self.config.collection.as_str(), rule.css),
            ));
        }
        for rule in parse_id_rules(&self.stylesheet) {
            custom.push((
                element_style_id(&rule.selector),
                StyleEntry::element(rule.selector, self.config.collection.as_str(), rule.css),
            ));
        }

        for (style_id, mut entry) in custom {
            let css = convert_to_logical_properties(entry.css.trim());
            match self.styles.get_mut(&style_id) {
                Some(existing) => {
                    if css.trim().is_empty() {
                        continue;
                    }
                    existing.css = if existing.css.trim().is_empty() {
                        css
                    } else {
                        format!("{}\n  {}", existing.css.trim(), css)
                    };
                    log::trace!("merged custom css into {}", existing.selector);
                }
                None => {
                    entry.css = css;
                    self.styles.insert(style_id, entry);
                }
            }
        }
    }

    fn append_breakpoint_css(&mut self) {
        for (class_id, blocks) in &self.breakpoint_css {
            let Some(mapped) = self.style_map.get(class_id) else {
                continue;
            };
            let Some(entry) = self.styles.get_mut(&mapped.id) else {
                continue;
            };
            for block in blocks {
                entry.css.push_str("\n\n");
                entry.css.push_str(block);
            }
        }
    }

    fn normalize_entries(&mut self) {
        for (style_id, entry) in self.styles.iter_mut() {
            if entry.css.is_empty() || entry.readonly {
                continue;
            }
            entry.css = normalize_final_css(&entry.css);
            if let Err(reason) = validate_css_syntax(&entry.css) {
                self.diagnostics.report(
                    DiagnosticKind::InvalidCss,
                    format!("{} ({}): {}", entry.selector, style_id, reason),
                );
            }
        }
    }

    fn is_referenced(&self, class: &StyleClass) -> bool {
        self.scanner
            .as_ref()
            .map_or(true, |scanner| scanner.is_referenced(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::Settings;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn class(id: &str, name: &str, settings: Value) -> StyleClass {
        let settings: Settings = serde_json::from_value(settings).unwrap();
        StyleClass::new(id, name, settings)
    }

    fn sources(classes: Vec<StyleClass>) -> StyleSources {
        StyleSources {
            classes,
            ..StyleSources::default()
        }
    }

    #[test]
    fn test_framework_styles_are_seeded_but_never_mapped() {
        let result = convert_styles(&sources(vec![]), &EngineConfig::default());

        assert!(result.styles.contains_key("etch-section-style"));
        assert!(result.styles.contains_key("etch-container-style"));
        assert!(result.styles.contains_key("etch-iframe-style"));
        assert!(result.styles.values().all(|e| e.readonly));
        assert!(result.style_map.is_empty());
        assert_eq!(result.status, StyleStatus::Empty);
        assert!(result.diagnostics.has(DiagnosticKind::EmptyStyleRegistry));
    }

    #[test]
    fn test_class_settings_become_registry_entry() {
        let result = convert_styles(
            &sources(vec![class("c1", "card", json!({ "_display": "grid", "_width": "50%" }))]),
            &EngineConfig::default(),
        );

        let mapped = result.for_class_id("c1").unwrap();
        assert_eq!(mapped.selector, ".card");
        let entry = result.entry(&mapped.id).unwrap();
        assert_eq!(entry.kind, StyleKind::Class);
        assert!(!entry.readonly);
        assert!(entry.css.contains("display: grid;"));
        assert!(entry.css.contains("inline-size: 50%;"));
        assert_eq!(result.status, StyleStatus::Converted);
        assert_eq!(result.for_class_name("card"), Some(mapped));
    }

    #[test]
    fn test_custom_css_merges_into_class_entry() {
        let result = convert_styles(
            &sources(vec![class(
                "c1",
                "card",
                json!({ "_display": "flex", "_cssCustom": "%root% { margin-top: 1rem; }\n%root%:hover { color: red; }" }),
            )]),
            &EngineConfig::default(),
        );

        let entry = result.entry(&result.for_class_id("c1").unwrap().id).unwrap();
        assert!(entry.css.starts_with("display: flex;"));
        assert!(entry.css.contains("margin-block-start: 1rem;"));
        assert!(entry.css.contains("&:hover"));
    }

    #[test]
    fn test_breakpoint_css_appends_media_block() {
        let result = convert_styles(
            &sources(vec![class(
                "c1",
                "hero",
                json!({ "_display": "flex", "_cssCustom:tablet_portrait": "%root% { gap: 1rem; }" }),
            )]),
            &EngineConfig::default(),
        );

        let entry = result.entry(&result.for_class_id("c1").unwrap().id).unwrap();
        assert_eq!(
            entry.css,
            "display: flex;\n\n@media (width <= to-rem(991px)) {\n  gap: 1rem;\n}"
        );
    }

    #[test]
    fn test_utility_classes_share_one_stub() {
        let mut first = class("u1", "card", json!({}));
        first.category = Some("acss".to_string());
        let mut second = class("u2", "Card", json!({}));
        second.category = Some("acss".to_string());

        let result = convert_styles(&sources(vec![first, second]), &EngineConfig::default());

        assert_eq!(result.style_map.len(), 2);
        assert_eq!(result.style_map["u1"].id, result.style_map["u2"].id);
        let stubs = result.styles.keys().filter(|id| !is_framework_style(id)).count();
        assert_eq!(stubs, 1);
    }

    #[test]
    fn test_excluded_and_malformed_classes_are_skipped() {
        let result = convert_styles(
            &sources(vec![
                class("b1", "brxe-heading", json!({ "_display": "flex" })),
                class("", "", json!({})),
                class("k1", "keep", json!({ "_display": "block" })),
            ]),
            &EngineConfig::default(),
        );

        assert!(result.for_class_id("b1").is_none());
        assert!(result.for_class_id("k1").is_some());
        assert!(result.diagnostics.has(DiagnosticKind::MalformedClass));
    }

    #[test]
    fn test_restrict_to_referenced_filters_classes() {
        let config = EngineConfig {
            restrict_to_referenced: true,
            ..EngineConfig::default()
        };
        let settings: Settings = serde_json::from_value(json!({ "_cssGlobalClasses": ["used"] })).unwrap();
        let sources = StyleSources {
            classes: vec![
                class("used", "used-class", json!({ "_display": "flex" })),
                class("unused", "unused-class", json!({ "_display": "flex" })),
            ],
            documents: vec![vec![SourceElement::new("e1", "div").with_settings(settings)]],
            ..StyleSources::default()
        };

        let result = convert_styles(&sources, &config);
        assert!(result.for_class_id("used").is_some());
        assert!(result.for_class_id("unused").is_none());
    }

    #[test]
    fn test_element_styles_and_id_custom_css() {
        let settings: Settings = serde_json::from_value(json!({
            "_padding": { "top": "10px" },
            "_cssCustom": "%root% { color: red; }"
        }))
        .unwrap();
        let sources = StyleSources {
            documents: vec![vec![SourceElement::new("abc", "div").with_settings(settings)]],
            ..StyleSources::default()
        };

        let result = convert_styles(&sources, &EngineConfig::default());
        let entry = result.entry(&element_style_id("#etch-abc")).unwrap();
        assert_eq!(entry.selector, "#etch-abc");
        assert!(entry.css.contains("padding-block-start: 10px;"));
        assert!(entry.css.contains("color: red;"));
    }

    #[test]
    fn test_apply_patches_prepends_once() {
        let mut result = convert_styles(
            &sources(vec![class("c1", "box", json!({ "_width": "10px" }))]),
            &EngineConfig::default(),
        );
        let style_id = result.for_class_id("c1").unwrap().id.clone();
        let patch = StylePatch {
            style_id: style_id.clone(),
            css: "display: flex; flex-direction: column;".to_string(),
        };

        result.apply_patches(&[patch.clone()]);
        result.apply_patches(&[patch]);
        assert_eq!(
            result.entry(&style_id).unwrap().css,
            "display: flex; flex-direction: column; inline-size: 10px;"
        );
    }
}
