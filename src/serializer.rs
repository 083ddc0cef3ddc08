//! Block tree → Etch block markup.
//!
//! Every block is an opening comment carrying its JSON payload, its inner
//! content on the following lines, and a closing comment. Siblings are joined
//! by a newline.

use serde_json::{json, Map, Value};

use crate::elements::{BlockBody, BlockNode, ComponentBlock, ElementBlock, RawHtmlBlock, SvgBlock};

/// Render a sequence of sibling blocks.
pub fn serialize_blocks(blocks: &[BlockNode]) -> String {
    blocks
        .iter()
        .map(serialize_block)
        .filter(|markup| !markup.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn serialize_block(block: &BlockNode) -> String {
    match block {
        BlockNode::Element(element) => serialize_element(element),
        BlockNode::RawHtml(raw) => serialize_raw_html(raw),
        BlockNode::Svg(svg) => serialize_svg(svg),
        BlockNode::Loop {
            loop_id,
            item_id,
            children,
        } => wrap(
            "etch/loop",
            &json!({ "loopId": loop_id, "itemId": item_id }),
            serialize_blocks(children).trim(),
        ),
        BlockNode::Component(component) => serialize_component(component),
        BlockNode::Slot { slot_id, children } => wrap(
            "etch/slot",
            &json!({ "name": "Slot", "slotId": slot_id }),
            &serialize_blocks(children),
        ),
        BlockNode::Comment(text) => format!("<!-- {} -->", escape_comment(text)),
        BlockNode::Fragment(children) => serialize_blocks(children),
    }
}

fn serialize_element(element: &ElementBlock) -> String {
    let mut payload = Map::new();
    payload.insert("metadata".to_string(), json!({ "name": element.metadata_name }));
    payload.insert("tag".to_string(), json!(element.tag));
    payload.insert("attributes".to_string(), json!(element.attributes));
    payload.insert("styles".to_string(), json!(element.style_ids));
    for (key, value) in &element.extra {
        payload.insert(key.clone(), value.clone());
    }

    let inner = match &element.body {
        BlockBody::Children(children) => serialize_blocks(children),
        BlockBody::Raw(content) => content.clone(),
    };
    wrap("etch/element", &Value::Object(payload), &inner)
}

fn serialize_raw_html(raw: &RawHtmlBlock) -> String {
    let payload = json!({
        "metadata": { "name": raw.metadata_name },
        "content": raw.content,
        "unsafe": raw.unsafe_markup,
    });
    format!(
        "<!-- wp:etch/raw-html {} -->\n<!-- /wp:etch/raw-html -->",
        escape_comment(&payload.to_string())
    )
}

fn serialize_svg(svg: &SvgBlock) -> String {
    let mut payload = Map::new();
    if let Some(name) = &svg.metadata_name {
        payload.insert("metadata".to_string(), json!({ "name": name }));
    }
    if let Some(tag) = &svg.tag {
        payload.insert("tag".to_string(), json!(tag));
    }
    payload.insert("attributes".to_string(), json!(svg.attributes));
    payload.insert("styles".to_string(), json!(svg.style_ids));
    wrap("etch/svg", &Value::Object(payload), "")
}

fn serialize_component(component: &ComponentBlock) -> String {
    let payload = json!({
        "ref": component.reference,
        "attributes": Value::Object(component.attributes.clone()),
    });
    let inner = component
        .children
        .iter()
        .map(serialize_block)
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "<!-- wp:etch/component {} -->\n{}\n<!-- /wp:etch/component -->",
        escape_comment(&payload.to_string()),
        inner
    )
}

/// Opening comment, inner content, closing comment. Empty content still
/// yields the pair.
fn wrap(name: &str, payload: &Value, inner: &str) -> String {
    let open = format!("<!-- wp:{} {} -->", name, escape_comment(&payload.to_string()));
    let close = format!("<!-- /wp:{} -->", name);
    if inner.is_empty() {
        format!("{}\n{}", open, close)
    } else {
        format!("{}\n{}\n{}", open, inner, close)
    }
}

/// A literal `--` would end the surrounding comment early.
/// `--` cannot appear inside an HTML comment.
fn escape_comment(text: &str) -> String {
    text.replace("--", "\\u002d\\u002d")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_element_with_raw_content() {
        let block: BlockNode = ElementBlock::new("Heading", "h2")
            .class("title")
            .styles(["s1"])
            .raw("Hi {this.title}")
            .into();
        assert_eq!(
            serialize_block(&block),
            "<!-- wp:etch/element {\"metadata\":{\"name\":\"Heading\"},\"tag\":\"h2\",\"attributes\":{\"class\":\"title\"},\"styles\":[\"s1\"]} -->\nHi {this.title}\n<!-- /wp:etch/element -->"
        );
    }

    #[test]
    fn test_empty_element_keeps_closing_comment() {
        let block: BlockNode = ElementBlock::new("Div", "div").into();
        assert_eq!(
            serialize_block(&block),
            "<!-- wp:etch/element {\"metadata\":{\"name\":\"Div\"},\"tag\":\"div\",\"attributes\":{},\"styles\":[]} -->\n<!-- /wp:etch/element -->"
        );
    }

    #[test]
    fn test_extra_keys_follow_styles() {
        let block: BlockNode = ElementBlock::new("Condition", "div")
            .attribute("data-etch-element", "condition")
            .extra("conditionType", json!("bricks"))
            .into();
        let markup = serialize_block(&block);
        assert!(markup.contains("\"styles\":[],\"conditionType\":\"bricks\"}"));
    }

    #[test]
    fn test_raw_html_escapes_comment_delimiters() {
        let block = BlockNode::raw_html("HTML", "<!-- x --><p>ok</p>", false);
        assert_eq!(
            serialize_block(&block),
            "<!-- wp:etch/raw-html {\"metadata\":{\"name\":\"HTML\"},\"content\":\"<!\\u002d\\u002d x \\u002d\\u002d><p>ok</p>\",\"unsafe\":false} -->\n<!-- /wp:etch/raw-html -->"
        );
    }

    #[test]
    fn test_comment_text_cannot_close_early() {
        let block = BlockNode::Comment("[EFS] Loop not converted: x-->y".to_string());
        assert_eq!(
            serialize_block(&block),
            "<!-- [EFS] Loop not converted: x\\u002d\\u002d>y -->"
        );
    }

    #[test]
    fn test_nested_loop_and_fragments() {
        let tree = vec![
            BlockNode::Comment("MIGRATION NOTE: check".to_string()),
            BlockNode::Loop {
                loop_id: "posts_1a2b3c4d".to_string(),
                item_id: "item".to_string(),
                children: vec![ElementBlock::new("Card", "article").into()],
            },
        ];
        let markup = serialize_blocks(&tree);
        let lines: Vec<_> = markup.lines().collect();
        assert_eq!(lines[0], "<!-- MIGRATION NOTE: check -->");
        assert_eq!(lines[1], "<!-- wp:etch/loop {\"loopId\":\"posts_1a2b3c4d\",\"itemId\":\"item\"} -->");
        assert_eq!(lines.last(), Some(&"<!-- /wp:etch/loop -->"));
    }
}
