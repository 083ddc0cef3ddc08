//! Target block tree built by the converters and rendered by the serializer.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::classes::push_unique;

/// Content of an element block: nested blocks or raw inner markup.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockBody {
    Children(Vec<BlockNode>),
    Raw(String),
}

impl Default for BlockBody {
    fn default() -> Self {
        BlockBody::Children(Vec::new())
    }
}

/// An `etch/element` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementBlock {
    pub metadata_name: String,
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub style_ids: Vec<String>,
    /// Payload keys after `styles` (`conditionType`, `script`, …).
    pub extra: Map<String, Value>,
    pub body: BlockBody,
}

impl ElementBlock {
    pub fn new(metadata_name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            metadata_name: metadata_name.into(),
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Set `class` unless `value` is blank.
    pub fn class(self, value: &str) -> Self {
        if value.trim().is_empty() {
            self
        } else {
            self.attribute("class", value.trim())
        }
    }

    pub fn styles<I, S>(mut self, style_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in style_ids {
            push_unique(&mut self.style_ids, id.as_ref());
        }
        self
    }

    /// Put `style_id` first, dropping any later duplicate.
    pub fn prepend_style(mut self, style_id: &str) -> Self {
        self.style_ids.retain(|id| id != style_id);
        self.style_ids.insert(0, style_id.to_string());
        self
    }

    pub fn extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn children(mut self, children: Vec<BlockNode>) -> Self {
        self.body = BlockBody::Children(children);
        self
    }

    pub fn raw(mut self, content: impl Into<String>) -> Self {
        self.body = BlockBody::Raw(content.into());
        self
    }
}

/// An `etch/raw-html` block.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHtmlBlock {
    pub metadata_name: String,
    pub content: String,
    /// Whether scripts in the markup may run.
    pub unsafe_markup: bool,
}

/// An `etch/svg` block. Inline icons carry a name, file-backed ones a tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvgBlock {
    pub metadata_name: Option<String>,
    pub tag: Option<String>,
    pub attributes: IndexMap<String, String>,
    pub style_ids: Vec<String>,
}

/// A component instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentBlock {
    pub reference: Value,
    pub attributes: Map<String, Value>,
    pub children: Vec<BlockNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockNode {
    Element(ElementBlock),
    RawHtml(RawHtmlBlock),
    Svg(SvgBlock),
    Loop {
        loop_id: String,
        item_id: String,
        children: Vec<BlockNode>,
    },
    Component(ComponentBlock),
    Slot {
        slot_id: String,
        children: Vec<BlockNode>,
    },
    /// An HTML comment; the text is written between `<!-- ` and ` -->`.
    Comment(String),
    /// Sibling blocks emitted in place of one node.
    Fragment(Vec<BlockNode>),
}

impl BlockNode {
    pub fn raw_html(metadata_name: impl Into<String>, content: impl Into<String>, unsafe_markup: bool) -> Self {
        BlockNode::RawHtml(RawHtmlBlock {
            metadata_name: metadata_name.into(),
            content: content.into(),
            unsafe_markup,
        })
    }

    /// Element blocks in this subtree, depth-first.
    pub fn elements(&self) -> Vec<&ElementBlock> {
        let mut found = Vec::new();
        self.collect_elements(&mut found);
        found
    }

    fn collect_elements<'b>(&'b self, found: &mut Vec<&'b ElementBlock>) {
        match self {
            BlockNode::Element(element) => {
                found.push(element);
                if let BlockBody::Children(children) = &element.body {
                    children.iter().for_each(|child| child.collect_elements(found));
                }
            }
            BlockNode::Loop { children, .. }
            | BlockNode::Slot { children, .. }
            | BlockNode::Component(ComponentBlock { children, .. })
            | BlockNode::Fragment(children) => {
                children.iter().for_each(|child| child.collect_elements(found));
            }
            BlockNode::RawHtml(_) | BlockNode::Svg(_) | BlockNode::Comment(_) => {}
        }
    }
}

impl From<ElementBlock> for BlockNode {
    fn from(element: ElementBlock) -> Self {
        BlockNode::Element(element)
    }
}
