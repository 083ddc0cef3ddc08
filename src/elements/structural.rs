//! Structural converters: wrappers whose content is their converted children.

use regex::Regex;
use serde_json::{json, Map, Number, Value};
use std::sync::OnceLock;

use super::blocks::{BlockNode, ElementBlock};
use super::ConvertContext;
use crate::css::settings::scalar;
use crate::css::Settings;
use crate::diagnostics::DiagnosticKind;
use crate::document::SourceElement;
use crate::styles::StyleConversion;

const SECTION_STYLE: &str = "etch-section-style";
const CONTAINER_STYLE: &str = "etch-container-style";

const SUPPORTED_CONDITIONS: &[&str] = &["logged_in", "user_role", "post_type", "page_template", "custom_field"];

/// Tag from `tag` (or `customTag` when `tag` is `custom`). Anything that is
/// not a plain lowercase element name falls back to `fallback`.
pub fn resolve_element_tag(settings: &Settings, fallback: &str) -> String {
    static VALID: OnceLock<Regex> = OnceLock::new();

    let tag = settings.get("tag").and_then(scalar).unwrap_or_default();
    let tag = if tag.trim() == "custom" {
        settings.get("customTag").and_then(scalar).unwrap_or_default()
    } else {
        tag
    };
    let tag = tag.trim().to_lowercase();
    let valid = VALID.get_or_init(|| Regex::new(r"^[a-z][a-z0-9-]*$").unwrap());
    if valid.is_match(&tag) {
        tag
    } else {
        fallback.to_string()
    }
}

pub fn convert_section(element: &SourceElement, children: Vec<BlockNode>, ctx: &mut ConvertContext) -> BlockNode {
    let resolved = ctx.resolve(element);
    ElementBlock::new(ctx.label(element, "Section"), resolve_element_tag(&element.settings, "section"))
        .attribute("data-etch-element", "section")
        .class(&resolved.class_names)
        .styles(&resolved.style_ids)
        .prepend_style(SECTION_STYLE)
        .children(children)
        .into()
}

pub fn convert_container(element: &SourceElement, children: Vec<BlockNode>, ctx: &mut ConvertContext) -> BlockNode {
    let resolved = ctx.resolve(element);
    ElementBlock::new(ctx.label(element, "Container"), resolve_element_tag(&element.settings, "div"))
        .attribute("data-etch-element", "container")
        .class(&resolved.class_names)
        .styles(&resolved.style_ids)
        .prepend_style(CONTAINER_STYLE)
        .children(children)
        .into()
}

/// `div` and `block`. Blocks also get the flex column default.
pub fn convert_div(element: &SourceElement, children: Vec<BlockNode>, ctx: &mut ConvertContext) -> BlockNode {
    let resolved = ctx.resolve(element);
    if element.kind == "block" {
        ctx.apply_block_display(element, &resolved);
    }
    ElementBlock::new(ctx.label(element, "Div"), resolve_element_tag(&element.settings, "div"))
        .class(&resolved.class_names)
        .styles(&resolved.style_ids)
        .children(children)
        .into()
}

/// A plain `div` keeping classes and children of a type with no converter.
pub fn convert_unknown(
    kind: &str,
    element: &SourceElement,
    children: Vec<BlockNode>,
    ctx: &mut ConvertContext,
) -> BlockNode {
    ctx.report(
        DiagnosticKind::UnsupportedElement,
        element,
        format!("element type '{}' has no converter, kept as div", kind),
    );
    let resolved = ctx.resolve(element);
    let name = ctx.type_label(element);
    ElementBlock::new(name, "div")
        .class(&resolved.class_names)
        .styles(&resolved.style_ids)
        .children(children)
        .into()
}

// ─── Conditions ──────────────────────────────────────────────────────────────

fn condition_type(condition: &Map<String, Value>) -> String {
    let kind = condition
        .get("type")
        .and_then(scalar)
        .map(|t| t.trim().to_lowercase())
        .unwrap_or_default();
    if kind.is_empty() {
        condition
            .get("condition")
            .and_then(scalar)
            .map(|t| t.trim().to_lowercase())
            .unwrap_or_default()
    } else {
        kind
    }
}

fn is_supported_condition(kind: &str) -> bool {
    let unsupported = kind.is_empty() || kind.starts_with("woocommerce_") || kind.starts_with("acf_") || kind == "php";
    !unsupported && SUPPORTED_CONDITIONS.contains(&kind)
}

/// Display conditions. Any unsupported condition leaves the children
/// unwrapped behind one comment per unsupported condition.
pub fn convert_condition(
    element: &SourceElement,
    children: Vec<BlockNode>,
    ctx: &mut ConvertContext,
) -> Option<BlockNode> {
    let conditions: Vec<Map<String, Value>> = ["_conditions", "conditions"]
        .iter()
        .find_map(|key| element.settings.get(*key).and_then(Value::as_array))
        .map(|items| items.iter().filter_map(Value::as_object).cloned().collect())
        .unwrap_or_default();

    if conditions.is_empty() {
        return (!children.is_empty()).then_some(BlockNode::Fragment(children));
    }

    let mut supported = Vec::new();
    let mut comments = Vec::new();
    for condition in conditions {
        let kind = condition_type(&condition);
        if is_supported_condition(&kind) {
            supported.push(Value::Object(condition));
            continue;
        }
        let reported = if kind.is_empty() { "unknown".to_string() } else { kind };
        ctx.report(
            DiagnosticKind::UnsupportedCondition,
            element,
            format!("condition '{}' cannot be converted", reported),
        );
        comments.push(BlockNode::Comment(format!("[EFS] Condition not converted: {}", reported)));
    }

    if !comments.is_empty() {
        comments.extend(children);
        return Some(BlockNode::Fragment(comments));
    }

    let resolved = ctx.resolve(element);
    let block = ElementBlock::new(ctx.label(element, "Condition"), resolve_element_tag(&element.settings, "div"))
        .attribute("data-etch-element", "condition")
        .class(&resolved.class_names)
        .styles(&resolved.style_ids)
        .extra("conditionType", json!("bricks"))
        .extra("conditions", Value::Array(supported))
        .children(children);
    Some(block.into())
}

// ─── Components ──────────────────────────────────────────────────────────────

/// Target reference of a component instance. Missing ids and unknown
/// components are reported.
pub fn component_reference(element: &SourceElement, ctx: &mut ConvertContext) -> Option<Value> {
    let cid = element
        .field("cid")
        .and_then(scalar)
        .map(|cid| cid.trim().to_string())
        .filter(|cid| !cid.is_empty());
    let Some(cid) = cid else {
        ctx.report(DiagnosticKind::MissingComponent, element, "component instance has no component id");
        return None;
    };
    match ctx.options.component_refs.get(&cid) {
        Some(reference) => Some(reference.clone()),
        None => {
            ctx.report(
                DiagnosticKind::MissingComponent,
                element,
                format!("component '{}' was not migrated", cid),
            );
            None
        }
    }
}

/// Instance property values in the target's types.
pub fn component_properties(element: &SourceElement, styles: &StyleConversion) -> Map<String, Value> {
    let Some(properties) = element.field("properties").and_then(Value::as_object) else {
        return Map::new();
    };
    properties
        .iter()
        .map(|(key, value)| (key.clone(), normalize_property(value, styles)))
        .collect()
}

/// Class-id lists become style ids, boolean-ish strings booleans and numeric
/// strings numbers.
pub fn normalize_property(value: &Value, styles: &StyleConversion) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| {
                    item.as_str()
                        .and_then(|class_id| styles.for_class_id(class_id))
                        .map(|mapped| json!(mapped.id))
                        .unwrap_or_else(|| item.clone())
                })
                .collect(),
        ),
        Value::Bool(_) | Value::Number(_) | Value::Object(_) => value.clone(),
        Value::Null => json!(""),
        Value::String(text) => match text.as_str() {
            "true" | "1" => json!(true),
            "false" | "0" => json!(false),
            other => numeric(other).unwrap_or_else(|| json!(other)),
        },
    }
}

fn numeric(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains('.') {
        let float: f64 = trimmed.parse().ok()?;
        Number::from_f64(float).map(Value::Number)
    } else {
        trimmed.parse::<i64>().ok().map(|int| json!(int))
    }
}

/// `slotChildren` as `(slotId, childIds)` pairs in declaration order.
pub fn slot_children(element: &SourceElement) -> Vec<(String, Vec<String>)> {
    let Some(slots) = element.field("slotChildren").and_then(Value::as_object) else {
        return Vec::new();
    };
    slots
        .iter()
        .filter_map(|(slot_id, ids)| {
            let ids = ids.as_array()?.iter().filter_map(scalar).collect();
            Some((slot_id.clone(), ids))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{BlockBody, ConvertOptions};
    use crate::styles::StyleMapEntry;
    use pretty_assertions::assert_eq;

    fn element(kind: &str, settings: Value) -> SourceElement {
        SourceElement::new("e1", kind).with_settings(settings.as_object().cloned().unwrap())
    }

    fn element_block(node: BlockNode) -> ElementBlock {
        match node {
            BlockNode::Element(block) => block,
            other => panic!("expected element block, got {:?}", other),
        }
    }

    #[test]
    fn test_tag_resolution() {
        let tag = |value: Value| resolve_element_tag(value.as_object().unwrap(), "div");
        assert_eq!(tag(json!({ "tag": "ARTICLE" })), "article");
        assert_eq!(tag(json!({ "tag": "custom", "customTag": "my-el" })), "my-el");
        assert_eq!(tag(json!({ "tag": "custom", "customTag": "<script>" })), "div");
        assert_eq!(tag(json!({})), "div");
    }

    #[test]
    fn test_section_and_container_defaults() {
        let styles = StyleConversion::default();
        let options = ConvertOptions::default();
        let mut ctx = ConvertContext::new(&styles, &options);

        let section = element_block(convert_section(&element("section", json!({})), Vec::new(), &mut ctx));
        assert_eq!(section.tag, "section");
        assert_eq!(section.metadata_name, "Section");
        assert_eq!(section.style_ids, vec!["etch-section-style"]);
        assert_eq!(section.attributes.get("data-etch-element").map(String::as_str), Some("section"));

        let container = element_block(convert_container(
            &element("container", json!({ "tag": "main" })),
            Vec::new(),
            &mut ctx,
        ));
        assert_eq!(container.tag, "main");
        assert_eq!(container.style_ids, vec!["etch-container-style"]);
    }

    #[test]
    fn test_unknown_type_keeps_children_and_reports() {
        let styles = StyleConversion::default();
        let options = ConvertOptions::default();
        let mut ctx = ConvertContext::new(&styles, &options);
        let child: BlockNode = ElementBlock::new("Child", "p").into();

        let block = element_block(convert_unknown("slider", &element("slider", json!({})), vec![child], &mut ctx));
        assert_eq!(block.tag, "div");
        assert_eq!(block.metadata_name, "Slider");
        assert!(matches!(&block.body, BlockBody::Children(children) if children.len() == 1));
        assert!(ctx.diagnostics.has(DiagnosticKind::UnsupportedElement));
    }

    #[test]
    fn test_supported_conditions_wrap_children() {
        let styles = StyleConversion::default();
        let options = ConvertOptions::default();
        let mut ctx = ConvertContext::new(&styles, &options);
        let node = element(
            "condition",
            json!({ "_conditions": [{ "key": "x", "type": "logged_in", "value": "1" }] }),
        );

        let block = element_block(convert_condition(&node, Vec::new(), &mut ctx).unwrap());
        assert_eq!(block.extra["conditionType"], "bricks");
        assert_eq!(block.extra["conditions"][0]["type"], "logged_in");
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn test_unsupported_conditions_emit_comments() {
        let styles = StyleConversion::default();
        let options = ConvertOptions::default();
        let mut ctx = ConvertContext::new(&styles, &options);
        let node = element(
            "condition",
            json!({ "conditions": [{ "type": "woocommerce_cart" }, { "type": "" }, { "condition": "user_role" }] }),
        );
        let child: BlockNode = ElementBlock::new("Child", "p").into();

        let result = convert_condition(&node, vec![child], &mut ctx).unwrap();
        let BlockNode::Fragment(parts) = result else {
            panic!("expected fragment");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], BlockNode::Comment("[EFS] Condition not converted: woocommerce_cart".to_string()));
        assert_eq!(parts[1], BlockNode::Comment("[EFS] Condition not converted: unknown".to_string()));
        assert_eq!(ctx.diagnostics.len(), 2);
    }

    #[test]
    fn test_condition_without_rules_passes_children_through() {
        let styles = StyleConversion::default();
        let options = ConvertOptions::default();
        let mut ctx = ConvertContext::new(&styles, &options);
        assert_eq!(convert_condition(&element("condition", json!({})), Vec::new(), &mut ctx), None);
    }

    #[test]
    fn test_property_normalization() {
        let mut styles = StyleConversion::default();
        styles.style_map.insert(
            "cls1".to_string(),
            StyleMapEntry {
                id: "s1".to_string(),
                selector: ".a".to_string(),
            },
        );
        let node = SourceElement::new("t", "template").with_extra(
            "properties",
            json!({ "classes": ["cls1", "other"], "flag": "1", "off": "false", "count": "3", "ratio": "1.5", "title": "Hi" }),
        );

        let properties = component_properties(&node, &styles);
        assert_eq!(
            Value::Object(properties),
            json!({ "classes": ["s1", "other"], "flag": true, "off": false, "count": 3, "ratio": 1.5, "title": "Hi" })
        );
    }

    #[test]
    fn test_component_reference_lookup() {
        let styles = StyleConversion::default();
        let mut options = ConvertOptions::default();
        options.component_refs.insert("hero".to_string(), json!(42));
        let mut ctx = ConvertContext::new(&styles, &options);

        let known = SourceElement::new("t", "template").with_extra("cid", json!("hero"));
        assert_eq!(component_reference(&known, &mut ctx), Some(json!(42)));

        let unknown = SourceElement::new("t", "template").with_extra("cid", json!("gone"));
        assert_eq!(component_reference(&unknown, &mut ctx), None);
        assert!(ctx.diagnostics.has(DiagnosticKind::MissingComponent));
    }
}
