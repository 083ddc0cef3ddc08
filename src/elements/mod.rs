//! # Element conversion
//!
//! Walks a parsed document through its [`ElementTree`] and converts every node
//! into target blocks. Dispatch is a closed match over [`ElementKind`]; types
//! without a converter fall back to a plain `div` and are reported.
//!
//! Style lookups only read the [`StyleConversion`]. Changes a conversion wants
//! made to the registry come back as [`StylePatch`]es.

pub mod blocks;
pub mod classes;
pub mod code;
pub mod content;
pub mod labels;
pub mod loops;
pub mod structural;

pub use blocks::{BlockBody, BlockNode, ComponentBlock, ElementBlock, RawHtmlBlock, SvgBlock};
pub use classes::{resolve_classes, ResolvedClasses};
pub use loops::{LoopPreset, LoopPresets};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::css::settings::{is_truthy, scalar};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::document::{ElementTree, SourceElement};
use crate::dynamic_data::{self, DynamicContext};
use crate::serializer::serialize_blocks;
use crate::styles::element_styles::selector_id_for;
use crate::styles::{element_style_id, StyleConversion, StylePatch};
use labels::{sanitize_label, type_label};

/// Settings keys that hide a node and its subtree.
const HIDDEN_KEYS: &[&str] = &["_hidden", "hidden", "_hideElement"];

const BLOCK_DISPLAY_DEFAULT: &str = "display: flex; flex-direction: column;";

// ─── Element kinds ───────────────────────────────────────────────────────────

/// Source element types the dispatcher knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Section,
    Container,
    Block,
    Div,
    Condition,
    Template,
    Text,
    TextBasic,
    Heading,
    Image,
    Button,
    TextLink,
    Icon,
    Svg,
    Video,
    Code,
    Html,
    Notes,
    Shortcode,
    Form,
    Map,
    Unknown(String),
}

impl ElementKind {
    pub fn from_type(kind: &str) -> Self {
        match kind.trim() {
            "section" => ElementKind::Section,
            "container" => ElementKind::Container,
            "block" => ElementKind::Block,
            "div" => ElementKind::Div,
            "condition" => ElementKind::Condition,
            "template" => ElementKind::Template,
            "text" => ElementKind::Text,
            "text-basic" => ElementKind::TextBasic,
            "heading" => ElementKind::Heading,
            "image" => ElementKind::Image,
            "button" => ElementKind::Button,
            "text-link" => ElementKind::TextLink,
            "icon" => ElementKind::Icon,
            "svg" => ElementKind::Svg,
            "video" => ElementKind::Video,
            "code" => ElementKind::Code,
            "html" => ElementKind::Html,
            "fr-notes" => ElementKind::Notes,
            "shortcode" => ElementKind::Shortcode,
            "form" => ElementKind::Form,
            "map" => ElementKind::Map,
            other => ElementKind::Unknown(other.to_string()),
        }
    }

    /// Types dropped without output or report.
    pub fn is_skipped(&self) -> bool {
        matches!(self, ElementKind::Form | ElementKind::Map)
    }
}

// ─── Options and results ─────────────────────────────────────────────────────

/// Caller-supplied inputs for one document conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConvertOptions {
    /// Source component id → target component reference.
    pub component_refs: IndexMap<String, Value>,
    /// Presets from earlier documents of the same run.
    pub loop_presets: LoopPresets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Converted,
    /// The document produced no blocks.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentConversion {
    pub markup: String,
    pub blocks: Vec<BlockNode>,
    pub status: DocumentStatus,
    pub diagnostics: Diagnostics,
    /// Every known preset, including the ones passed in.
    pub loop_presets: LoopPresets,
    /// Registry changes for [`StyleConversion::apply_patches`].
    pub style_patches: Vec<StylePatch>,
    /// CSS lifted out of code elements.
    pub extracted_css: Vec<String>,
}

// ─── Conversion context ──────────────────────────────────────────────────────

/// State shared by the per-type converters while one document is converted.
pub struct ConvertContext<'a> {
    pub styles: &'a StyleConversion,
    pub options: &'a ConvertOptions,
    pub scope: DynamicContext,
    pub diagnostics: Diagnostics,
    pub style_patches: Vec<StylePatch>,
    pub extracted_css: Vec<String>,
}

impl<'a> ConvertContext<'a> {
    pub fn new(styles: &'a StyleConversion, options: &'a ConvertOptions) -> Self {
        Self {
            styles,
            options,
            scope: DynamicContext::root(),
            diagnostics: Diagnostics::new(),
            style_patches: Vec::new(),
            extracted_css: Vec::new(),
        }
    }

    pub fn resolve(&self, element: &SourceElement) -> ResolvedClasses {
        resolve_classes(&element.settings, self.styles)
    }

    /// Rewrite dynamic data in the current loop scope.
    pub fn dynamic(&mut self, text: &str, element: &SourceElement) -> String {
        dynamic_data::rewrite_with_diagnostics(text, &self.scope, Some(&element.id), &mut self.diagnostics)
    }

    pub fn report(&mut self, kind: DiagnosticKind, element: &SourceElement, message: impl Into<String>) {
        self.diagnostics.report_for(kind, element.id.as_str(), message);
    }

    /// Block name from the node's label.
    pub fn label(&self, element: &SourceElement, fallback: &str) -> String {
        sanitize_label(element.label.as_deref().unwrap_or_default(), fallback)
    }

    /// Label fallback derived from the node type.
    pub fn type_label(&self, element: &SourceElement) -> String {
        self.label(element, &type_label(&element.kind))
    }

    /// Queue the flex column default for a `block` node's only user class.
    pub fn apply_block_display(&mut self, element: &SourceElement, resolved: &ResolvedClasses) {
        let user_classes: Vec<&String> = resolved
            .source_ids
            .iter()
            .filter(|class_id| !self.styles.utility_classes.contains(class_id.as_str()))
            .collect();
        let [class_id] = user_classes.as_slice() else {
            return;
        };
        let Some(mapped) = self.styles.for_class_id(class_id) else {
            return;
        };
        let Some(entry) = self.styles.entry(&mapped.id) else {
            return;
        };
        if entry.declares("display") || entry.declares("flex-direction") {
            return;
        }
        let wants_grid = element
            .settings
            .get("_display")
            .and_then(scalar)
            .map(|display| display.trim() == "grid")
            .unwrap_or(false);
        if wants_grid || self.style_patches.iter().any(|p| p.style_id == mapped.id) {
            return;
        }
        log::debug!("block {} gets flex column default on {}", element.id, mapped.id);
        self.style_patches.push(StylePatch {
            style_id: mapped.id.clone(),
            css: BLOCK_DISPLAY_DEFAULT.to_string(),
        });
    }
}

pub fn is_hidden(element: &SourceElement) -> bool {
    HIDDEN_KEYS
        .iter()
        .any(|key| element.settings.get(*key).map(is_truthy).unwrap_or(false))
}

// ─── Document walk ───────────────────────────────────────────────────────────

/// Converts one document against a finished style conversion.
pub struct DocumentConverter<'a> {
    tree: ElementTree<'a>,
    context: ConvertContext<'a>,
    presets: LoopPresets,
    visited: IndexSet<&'a str>,
}

impl<'a> DocumentConverter<'a> {
    pub fn new(elements: &'a [SourceElement], styles: &'a StyleConversion, options: &'a ConvertOptions) -> Self {
        Self {
            tree: ElementTree::new(elements),
            context: ConvertContext::new(styles, options),
            presets: options.loop_presets.clone(),
            visited: IndexSet::new(),
        }
    }

    pub fn convert(mut self) -> DocumentConversion {
        let roots: Vec<&'a SourceElement> = self.tree.roots().collect();
        let blocks: Vec<BlockNode> = roots
            .into_iter()
            .filter_map(|root| self.convert_node(root))
            .collect();

        let status = if blocks.is_empty() {
            let message = format!("no blocks produced from {} source nodes", self.tree.len());
            self.context.diagnostics.report(DiagnosticKind::EmptyDocument, message);
            DocumentStatus::Empty
        } else {
            DocumentStatus::Converted
        };
        log::debug!("converted {} top-level blocks", blocks.len());

        DocumentConversion {
            markup: serialize_blocks(&blocks),
            blocks,
            status,
            diagnostics: self.context.diagnostics,
            loop_presets: self.presets,
            style_patches: self.context.style_patches,
            extracted_css: self.context.extracted_css,
        }
    }

    /// Convert `element` and its subtree. Hidden nodes yield nothing and
    /// their descendants are never visited. Each node converts at most once,
    /// so child cycles and shared children are cut and reported.
    fn convert_node(&mut self, element: &'a SourceElement) -> Option<BlockNode> {
        if !self.visited.insert(element.id.as_str()) {
            self.context.report(
                DiagnosticKind::MalformedNode,
                element,
                format!("element {} is reached more than once", element.id),
            );
            return None;
        }
        if is_hidden(element) {
            log::trace!("skipping hidden element {}", element.id);
            return None;
        }
        let kind = ElementKind::from_type(&element.kind);
        if kind.is_skipped() {
            log::trace!("skipping {} element {}", element.kind, element.id);
            return None;
        }

        let query = loops::loop_query(&element.settings);
        let repeats = query.filter(|query| loops::rejected_query_type(query).is_none());
        let outer_scope = repeats.map(|query| {
            let scope = DynamicContext::in_loop(loops::LOOP_ITEM_ALIAS, Some(loops::query_kind(query)));
            std::mem::replace(&mut self.context.scope, scope)
        });

        let block = match kind {
            ElementKind::Template => self.convert_component(element),
            kind => {
                let children = self.convert_children(element, &[]);
                self.dispatch(&kind, element, children)
            }
        };

        if let Some(outer) = outer_scope {
            self.context.scope = outer;
        }
        let block = self.attach_element_style(element, block?);
        match query {
            Some(query) => Some(self.wrap_loop(element, query, block)),
            None => Some(block),
        }
    }

    fn convert_children(&mut self, element: &'a SourceElement, skip: &[String]) -> Vec<BlockNode> {
        let children = self.tree.children(element);
        children
            .into_iter()
            .filter(|child| !skip.contains(&child.id))
            .filter_map(|child| self.convert_node(child))
            .collect()
    }

    fn dispatch(&mut self, kind: &ElementKind, element: &SourceElement, children: Vec<BlockNode>) -> Option<BlockNode> {
        let ctx = &mut self.context;
        match kind {
            ElementKind::Section => Some(structural::convert_section(element, children, ctx)),
            ElementKind::Container => Some(structural::convert_container(element, children, ctx)),
            ElementKind::Block | ElementKind::Div => Some(structural::convert_div(element, children, ctx)),
            ElementKind::Condition => structural::convert_condition(element, children, ctx),
            ElementKind::Text | ElementKind::TextBasic => content::convert_text(element, ctx),
            ElementKind::Heading => content::convert_heading(element, ctx),
            ElementKind::Image => content::convert_image(element, ctx),
            ElementKind::Button => Some(content::convert_button(element, ctx)),
            ElementKind::TextLink => Some(content::convert_text_link(element, ctx)),
            ElementKind::Icon => content::convert_icon(element, ctx),
            ElementKind::Svg => content::convert_svg(element, ctx),
            ElementKind::Video => content::convert_video(element, ctx),
            ElementKind::Code => code::convert_code(element, ctx),
            ElementKind::Html => Some(code::convert_html(element, ctx)),
            ElementKind::Notes => Some(code::convert_notes(element)),
            ElementKind::Shortcode => code::convert_shortcode(element, ctx),
            ElementKind::Unknown(name) => Some(structural::convert_unknown(name, element, children, ctx)),
            ElementKind::Template | ElementKind::Form | ElementKind::Map => None,
        }
    }

    /// Component instances render their slot children into named slots;
    /// remaining children follow the slots.
    fn convert_component(&mut self, element: &'a SourceElement) -> Option<BlockNode> {
        let reference = structural::component_reference(element, &mut self.context)?;
        let attributes = structural::component_properties(element, self.context.styles);

        let mut slotted: Vec<String> = Vec::new();
        let mut parts: Vec<BlockNode> = Vec::new();
        for (slot_id, child_ids) in structural::slot_children(element) {
            let mut inner = Vec::new();
            for child_id in child_ids {
                slotted.push(child_id.clone());
                if let Some(child) = self.tree.get(&child_id) {
                    inner.extend(self.convert_node(child));
                }
            }
            parts.push(BlockNode::Slot {
                slot_id,
                children: inner,
            });
        }
        parts.extend(self.convert_children(element, &slotted));

        Some(BlockNode::Component(ComponentBlock {
            reference,
            attributes,
            children: parts,
        }))
    }

    /// Rejected query types keep their content behind a comment.
    fn wrap_loop(&mut self, element: &SourceElement, query: &serde_json::Map<String, Value>, block: BlockNode) -> BlockNode {
        if let Some(query_type) = loops::rejected_query_type(query) {
            self.context.report(
                DiagnosticKind::UnsupportedLoop,
                element,
                format!("loop query type '{}' cannot be converted", query_type),
            );
            return BlockNode::Fragment(vec![
                BlockNode::Comment(format!("[EFS] Loop not converted: {}", query_type)),
                block,
            ]);
        }
        let loop_id = self.presets.ensure(query, element.label.as_deref());
        BlockNode::Loop {
            loop_id,
            item_id: loops::LOOP_ITEM_ALIAS.to_string(),
            children: vec![block],
        }
    }

    /// Link the node's own `#etch-<id>` style, when the style pass made one.
    fn attach_element_style(&self, element: &SourceElement, block: BlockNode) -> BlockNode {
        let BlockNode::Element(mut element_block) = block else {
            return block;
        };
        let Some(selector_id) = selector_id_for(&element.id) else {
            return BlockNode::Element(element_block);
        };
        let style_id = element_style_id(&format!("#{}", selector_id));
        if self.context.styles.entry(&style_id).is_some() {
            element_block = element_block.attribute("id", selector_id).styles([style_id]);
        }
        BlockNode::Element(element_block)
    }
}

/// Convert one parsed document against `styles`.
pub fn convert_document(
    elements: &[SourceElement],
    styles: &StyleConversion,
    options: &ConvertOptions,
) -> DocumentConversion {
    DocumentConverter::new(elements, styles, options).convert()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::Settings;
    use crate::styles::{StyleEntry, StyleMapEntry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn settings(value: Value) -> Settings {
        value.as_object().cloned().unwrap()
    }

    fn styles_with_card(css: &str) -> StyleConversion {
        let mut styles = StyleConversion::default();
        styles
            .styles
            .insert("s1".to_string(), StyleEntry::class(".card", "default", css));
        styles.style_map.insert(
            "g1".to_string(),
            StyleMapEntry {
                id: "s1".to_string(),
                selector: ".card".to_string(),
            },
        );
        styles.class_ids_by_name.insert("card".to_string(), "g1".to_string());
        styles
    }

    #[test]
    fn test_kind_dispatch_table() {
        assert_eq!(ElementKind::from_type("text-basic"), ElementKind::TextBasic);
        assert_eq!(ElementKind::from_type("fr-notes"), ElementKind::Notes);
        assert_eq!(ElementKind::from_type("slider"), ElementKind::Unknown("slider".to_string()));
        assert!(ElementKind::from_type("form").is_skipped());
    }

    #[test]
    fn test_hidden_subtree_is_not_visited() {
        let elements = vec![
            SourceElement::new("root", "section").with_children(["hidden"]),
            SourceElement::new("hidden", "div")
                .with_parent("root")
                .with_children(["leaf"])
                .with_settings(settings(json!({ "_hidden": true }))),
            SourceElement::new("leaf", "slider").with_parent("hidden"),
        ];
        let styles = StyleConversion::default();
        let result = convert_document(&elements, &styles, &ConvertOptions::default());

        assert!(!result.markup.contains("Div"));
        assert!(!result.diagnostics.has(DiagnosticKind::UnsupportedElement));
        assert_eq!(result.blocks[0].elements().len(), 1);
    }

    #[test]
    fn test_block_display_patch() {
        let styles = styles_with_card("padding: 1rem;");
        let elements = vec![SourceElement::new("b", "block")
            .with_settings(settings(json!({ "_cssGlobalClasses": ["g1"] })))];
        let result = convert_document(&elements, &styles, &ConvertOptions::default());

        assert_eq!(
            result.style_patches,
            vec![StylePatch {
                style_id: "s1".to_string(),
                css: "display: flex; flex-direction: column;".to_string(),
            }]
        );
        assert!(result.markup.contains("\"class\":\"card\""));
    }

    #[test]
    fn test_block_display_respects_existing_layout() {
        let styles = styles_with_card("display: grid;");
        let elements = vec![SourceElement::new("b", "block")
            .with_settings(settings(json!({ "_cssGlobalClasses": ["g1"] })))];
        let result = convert_document(&elements, &styles, &ConvertOptions::default());
        assert!(result.style_patches.is_empty());

        let styles = styles_with_card("padding: 0;");
        let grid = vec![SourceElement::new("b", "block")
            .with_settings(settings(json!({ "_cssGlobalClasses": ["g1"], "_display": "grid" })))];
        assert!(convert_document(&grid, &styles, &ConvertOptions::default())
            .style_patches
            .is_empty());
    }

    #[test]
    fn test_loop_wraps_and_rebinds() {
        let elements = vec![
            SourceElement::new("list", "div")
                .with_label("Latest posts")
                .with_children(["title"])
                .with_settings(settings(json!({ "hasLoop": true, "query": { "post_type": ["post"] } }))),
            SourceElement::new("title", "heading")
                .with_parent("list")
                .with_settings(settings(json!({ "text": "{post_title}" }))),
        ];
        let styles = StyleConversion::default();
        let result = convert_document(&elements, &styles, &ConvertOptions::default());

        assert_eq!(result.loop_presets.len(), 1);
        let (loop_id, _) = result.loop_presets.iter().next().unwrap();
        assert!(loop_id.starts_with("latest-posts_"));
        assert!(result.markup.starts_with(&format!(
            "<!-- wp:etch/loop {{\"loopId\":\"{}\",\"itemId\":\"item\"}} -->",
            loop_id
        )));
        assert!(result.markup.contains("\n{item.title}\n"));
    }

    #[test]
    fn test_rejected_loop_keeps_content() {
        let elements = vec![SourceElement::new("list", "heading").with_settings(settings(json!({
            "text": "Product",
            "hasLoop": true,
            "query": { "type": "woocommerce" }
        })))];
        let styles = StyleConversion::default();
        let result = convert_document(&elements, &styles, &ConvertOptions::default());

        assert!(result.markup.starts_with("<!-- [EFS] Loop not converted: woocommerce -->\n<!-- wp:etch/element"));
        assert!(result.diagnostics.has(DiagnosticKind::UnsupportedLoop));
        assert!(result.loop_presets.is_empty());
    }

    #[test]
    fn test_rejected_loop_keeps_outer_scope() {
        let elements = vec![SourceElement::new("list", "heading").with_settings(settings(json!({
            "text": "{post_title}",
            "hasLoop": true,
            "query": { "type": "woocommerce" }
        })))];
        let styles = StyleConversion::default();
        let result = convert_document(&elements, &styles, &ConvertOptions::default());

        assert!(result.markup.contains("\n{this.title}\n"));
        assert!(!result.markup.contains("item."));
    }

    #[test]
    fn test_child_cycle_is_cut_and_reported() {
        let elements = vec![
            SourceElement::new("r", "section").with_children(["a"]),
            SourceElement::new("a", "div").with_parent("r").with_children(["b"]),
            SourceElement::new("b", "div").with_parent("a").with_children(["a"]),
        ];
        let styles = StyleConversion::default();
        let result = convert_document(&elements, &styles, &ConvertOptions::default());

        assert_eq!(result.status, DocumentStatus::Converted);
        assert_eq!(result.blocks[0].elements().len(), 3);
        let reports: Vec<_> = result.diagnostics.of_kind(DiagnosticKind::MalformedNode).collect();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].element_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_shared_child_is_emitted_once() {
        let elements = vec![
            SourceElement::new("r", "section").with_children(["x", "y"]),
            SourceElement::new("x", "div").with_parent("r").with_children(["shared"]),
            SourceElement::new("y", "div").with_parent("r").with_children(["shared"]),
            SourceElement::new("shared", "heading")
                .with_parent("x")
                .with_settings(settings(json!({ "text": "Once" }))),
        ];
        let styles = StyleConversion::default();
        let result = convert_document(&elements, &styles, &ConvertOptions::default());

        assert_eq!(result.markup.matches("\nOnce\n").count(), 1);
        assert!(result.diagnostics.has(DiagnosticKind::MalformedNode));
    }

    #[test]
    fn test_element_style_adds_id_attribute() {
        let mut styles = StyleConversion::default();
        styles.styles.insert(
            element_style_id("#etch-abc"),
            StyleEntry::element("#etch-abc", "default", "inline-size: 10px;"),
        );
        let elements = vec![SourceElement::new("abc", "div")];
        let result = convert_document(&elements, &styles, &ConvertOptions::default());

        let element = result.blocks[0].elements()[0].clone();
        assert_eq!(element.attributes.get("id").map(String::as_str), Some("etch-abc"));
        assert_eq!(element.style_ids, vec![element_style_id("#etch-abc")]);
    }

    #[test]
    fn test_empty_document_is_soft_failure() {
        let styles = StyleConversion::default();
        let result = convert_document(&[], &styles, &ConvertOptions::default());
        assert_eq!(result.status, DocumentStatus::Empty);
        assert_eq!(result.markup, "");
        assert!(result.diagnostics.has(DiagnosticKind::EmptyDocument));
    }
}
