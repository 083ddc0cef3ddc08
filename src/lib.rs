//! # Etch Fusion conversion engine
//!
//! Converts page-builder documents and their global style classes into Etch
//! block markup and an Etch style registry.
//!
//! ## Features
//! - Style pass: global classes, utility classes, custom stylesheets and
//!   element-scoped styles become one registry plus a class → style map
//! - Document pass: every source element becomes `etch/*` blocks, with loops,
//!   conditions, components and slots
//! - Dynamic-data tags rewritten to Etch expressions, loop-aware
//! - Non-fatal diagnostics instead of errors for anything that cannot migrate
//!
//! ## Example
//! ```ignore
//! use etchfusion_engine::{convert_document, convert_styles, parse_document, ConvertOptions, EngineConfig, StyleSources};
//!
//! let elements = parse_document(r#"[{"id":"h1","name":"heading","settings":{"text":"Hi {post_title}"}}]"#)?;
//! let sources = StyleSources { documents: vec![elements.clone()], ..StyleSources::default() };
//! let styles = convert_styles(&sources, &EngineConfig::default());
//! let result = convert_document(&elements, &styles, &ConvertOptions::default());
//! assert!(result.markup.contains("Hi {this.title}"));
//! ```

pub mod config;
pub mod css;
pub mod diagnostics;
pub mod document;
pub mod dynamic_data;
pub mod elements;
pub mod error;
pub mod serializer;
pub mod styles;

// --- Core types ---
pub use config::{CustomBreakpoint, EngineConfig, FrameworkStyle};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use document::{parse_document, parse_document_value, ElementTree, SourceElement};
pub use dynamic_data::{DynamicContext, LoopScope, TagSupport};
pub use error::{EngineError, EngineResult};

// --- Document conversion ---
pub use elements::{
    convert_document, BlockNode, ConvertOptions, DocumentConversion, DocumentStatus, LoopPreset, LoopPresets,
};
pub use serializer::{serialize_block, serialize_blocks};

// --- Style conversion ---
pub use styles::{
    convert_styles, parse_style_classes, StyleClass, StyleConversion, StyleEntry, StyleMapEntry, StylePatch,
    StyleSources, StyleStatus,
};

/// Rewrite the dynamic-data tags in `text` for the given loop scope.
pub fn rewrite_dynamic_data(text: &str, context: &DynamicContext) -> String {
    dynamic_data::rewrite(text, context)
}
