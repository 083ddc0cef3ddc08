//! # CSS pipeline
//!
//! Leaf stages of the style conversion: breakpoint lookup, string-level CSS
//! normalization, structured-settings conversion and custom-stylesheet parsing.
//! None of these hold state between calls.

pub mod breakpoints;
pub mod normalizer;
pub mod settings;
pub mod stylesheet;

pub use breakpoints::{Breakpoint, BreakpointKind, BreakpointResolver, QuerySyntax};
pub use settings::{Settings, SettingsConverter};
pub use stylesheet::{parse_class_rules, parse_id_rules, ScopedRule, SelectorKind};
