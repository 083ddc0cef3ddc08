//! Breakpoint resolution.
//!
//! Maps the source builder's named breakpoints (`tablet_portrait`, `mobile_landscape`, …)
//! to media-query conditions, either in Etch's `to-rem()` range syntax or in plain
//! `min-width`/`max-width` form.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::config::CustomBreakpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BreakpointKind {
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySyntax {
    /// `(width <= to-rem(991px))`
    Etch,
    /// `(max-width: 991px)`
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub key: String,
    pub kind: BreakpointKind,
    pub width: u32,
}

/// Built-in breakpoints, in px.
const DEFAULT_BREAKPOINTS: &[(&str, BreakpointKind, u32)] = &[
    ("tablet_landscape", BreakpointKind::Max, 1199),
    ("tablet_portrait", BreakpointKind::Max, 991),
    ("mobile_landscape", BreakpointKind::Max, 767),
    ("mobile_portrait", BreakpointKind::Max, 478),
    ("desktop", BreakpointKind::Min, 1200),
];

/// Short names accepted in settings keys and custom CSS keys.
const BREAKPOINT_ALIASES: &[(&str, &str)] = &[
    ("tablet", "tablet_portrait"),
    ("mobile", "mobile_portrait"),
];

const DESKTOP: &str = "desktop";

#[derive(Debug, Clone, PartialEq)]
pub struct BreakpointResolver {
    /// Desktop first, then max-width breakpoints largest-first.
    breakpoints: Vec<Breakpoint>,
}

impl Default for BreakpointResolver {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl BreakpointResolver {
    /// Build the breakpoint table from the defaults plus site-specific entries.
    ///
    /// An entry flagged `base` (or keyed `desktop`) replaces the desktop breakpoint
    /// with `min-width: width + 1`.
    pub fn new(custom: &[CustomBreakpoint]) -> Self {
        let mut desktop = Breakpoint {
            key: DESKTOP.to_string(),
            kind: BreakpointKind::Min,
            width: 1200,
        };
        let mut others: Vec<Breakpoint> = DEFAULT_BREAKPOINTS
            .iter()
            .filter(|(key, _, _)| *key != DESKTOP)
            .map(|(key, kind, width)| Breakpoint {
                key: key.to_string(),
                kind: *kind,
                width: *width,
            })
            .collect();

        for item in custom {
            let key = sanitize_key(&item.key);
            if key.is_empty() || item.width == 0 {
                continue;
            }
            if key == DESKTOP || item.base {
                desktop.width = item.width.saturating_add(1);
                continue;
            }
            match others.iter_mut().find(|bp| bp.key == key) {
                Some(existing) => existing.width = item.width,
                None => others.push(Breakpoint {
                    key,
                    kind: BreakpointKind::Max,
                    width: item.width,
                }),
            }
        }

        // Stable sort keeps declaration order for equal widths.
        others.sort_by(|a, b| b.width.cmp(&a.width));

        let mut breakpoints = Vec::with_capacity(others.len() + 1);
        breakpoints.push(desktop);
        breakpoints.extend(others);
        Self { breakpoints }
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn get(&self, key: &str) -> Option<&Breakpoint> {
        let key = canonical_key(key);
        self.breakpoints.iter().find(|bp| bp.key == key)
    }

    pub fn is_breakpoint(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The bare media condition for a breakpoint, e.g. `(width <= to-rem(991px))`.
    pub fn condition_for(&self, key: &str, syntax: QuerySyntax) -> Option<String> {
        self.get(key).map(|bp| render_condition(bp, syntax))
    }

    /// The full `@media …` prelude in Etch syntax, or `None` for an unknown key.
    pub fn media_query_for(&self, key: &str) -> Option<String> {
        self.condition_for(key, QuerySyntax::Etch)
            .map(|condition| format!("@media {}", condition))
    }

    /// All `(key, condition)` pairs in table order.
    pub fn media_query_map(&self, syntax: QuerySyntax) -> Vec<(String, String)> {
        self.breakpoints
            .iter()
            .map(|bp| (bp.key.clone(), render_condition(bp, syntax)))
            .collect()
    }

    /// Breakpoint keys relevant to a settings object: every known key plus any
    /// `_cssCustom:<bp>` suffix found in the settings.
    pub fn detect_breakpoint_keys(&self, settings: &Map<String, Value>) -> Vec<String> {
        let mut keys: Vec<String> = self.breakpoints.iter().map(|bp| bp.key.clone()).collect();
        for setting_key in settings.keys() {
            if let Some(suffix) = setting_key.strip_prefix("_cssCustom:") {
                let bp = sanitize_key(suffix);
                if !bp.is_empty() && !keys.contains(&bp) {
                    keys.push(bp);
                }
            }
        }
        keys
    }
}

fn render_condition(bp: &Breakpoint, syntax: QuerySyntax) -> String {
    match (syntax, bp.kind) {
        (QuerySyntax::Etch, BreakpointKind::Min) => format!("(width >= to-rem({}px))", bp.width),
        (QuerySyntax::Etch, BreakpointKind::Max) => format!("(width <= to-rem({}px))", bp.width),
        (QuerySyntax::Plain, BreakpointKind::Min) => format!("(min-width: {}px)", bp.width),
        (QuerySyntax::Plain, BreakpointKind::Max) => format!("(max-width: {}px)", bp.width),
    }
}

fn canonical_key(key: &str) -> String {
    let key = sanitize_key(key);
    BREAKPOINT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, target)| target.to_string())
        .unwrap_or(key)
}

/// Lowercase and keep only `[a-z0-9_-]`.
pub fn sanitize_key(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-')
        .collect()
}

/// Rewrite px-based media/container conditions into Etch's `to-rem()` range syntax.
/// Conditions that already use `to-rem(` are returned unchanged.
pub fn normalize_media_condition_to_etch(condition: &str) -> String {
    if condition.contains("to-rem(") {
        return condition.to_string();
    }

    static MIN_WIDTH: OnceLock<Regex> = OnceLock::new();
    static MAX_WIDTH: OnceLock<Regex> = OnceLock::new();
    static RANGE: OnceLock<Regex> = OnceLock::new();

    let min_width = MIN_WIDTH
        .get_or_init(|| Regex::new(r"\(\s*min-width\s*:\s*(\d+(?:\.\d+)?)px\s*\)").unwrap());
    let max_width = MAX_WIDTH
        .get_or_init(|| Regex::new(r"\(\s*max-width\s*:\s*(\d+(?:\.\d+)?)px\s*\)").unwrap());
    let range = RANGE.get_or_init(|| {
        Regex::new(r"\(\s*(width|inline-size|block-size)\s*(>=|<=|>|<)\s*(\d+(?:\.\d+)?)px\s*\)")
            .unwrap()
    });

    let out = min_width.replace_all(condition, "(width >= to-rem(${1}px))");
    let out = max_width.replace_all(&out, "(width <= to-rem(${1}px))");
    let out = range.replace_all(&out, "($1 $2 to-rem(${3}px))");
    out.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_default_table_order() {
        let resolver = BreakpointResolver::default();
        let keys: Vec<_> = resolver.breakpoints().iter().map(|bp| bp.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "desktop",
                "tablet_landscape",
                "tablet_portrait",
                "mobile_landscape",
                "mobile_portrait"
            ]
        );
    }

    #[test]
    fn test_media_query_for_known_and_unknown() {
        let resolver = BreakpointResolver::default();
        assert_eq!(
            resolver.media_query_for("tablet_portrait"),
            Some("@media (width <= to-rem(991px))".to_string())
        );
        assert_eq!(
            resolver.media_query_for("desktop"),
            Some("@media (width >= to-rem(1200px))".to_string())
        );
        assert_eq!(resolver.media_query_for("watch"), None);
    }

    #[test]
    fn test_alias_keys() {
        let resolver = BreakpointResolver::default();
        assert_eq!(
            resolver.media_query_for("tablet"),
            resolver.media_query_for("tablet_portrait")
        );
        assert_eq!(
            resolver.condition_for("mobile", QuerySyntax::Plain),
            Some("(max-width: 478px)".to_string())
        );
    }

    #[test]
    fn test_custom_breakpoints_merge_and_sort() {
        let resolver = BreakpointResolver::new(&[
            CustomBreakpoint {
                key: "Widescreen".to_string(),
                width: 1600,
                base: false,
            },
            CustomBreakpoint {
                key: "laptop".to_string(),
                width: 1366,
                base: true,
            },
        ]);
        let keys: Vec<_> = resolver.breakpoints().iter().map(|bp| bp.key.as_str()).collect();
        assert_eq!(keys[0], "desktop");
        assert_eq!(keys[1], "widescreen");
        assert_eq!(
            resolver.condition_for("desktop", QuerySyntax::Plain),
            Some("(min-width: 1367px)".to_string())
        );
    }

    #[test]
    fn test_base_breakpoint_at_max_width_saturates() {
        let resolver = BreakpointResolver::new(&[CustomBreakpoint {
            key: "huge".to_string(),
            width: u32::MAX,
            base: true,
        }]);
        assert_eq!(
            resolver.condition_for("desktop", QuerySyntax::Plain),
            Some(format!("(min-width: {}px)", u32::MAX))
        );
    }

    #[test]
    fn test_detect_breakpoint_keys_includes_custom_css_suffixes() {
        let resolver = BreakpointResolver::default();
        let settings = json!({ "_cssCustom:Phablet": ".x{}", "_padding": "1rem" });
        let keys = resolver.detect_breakpoint_keys(settings.as_object().unwrap());
        assert!(keys.contains(&"phablet".to_string()));
        assert!(keys.contains(&"desktop".to_string()));
        assert_eq!(keys.len(), 6);
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("Tablet Portrait!"), "tabletportrait");
        assert_eq!(sanitize_key("mobile_landscape"), "mobile_landscape");
    }

    #[test]
    fn test_normalize_media_condition() {
        assert_eq!(
            normalize_media_condition_to_etch("(min-width: 768px) and (max-width: 1023.5px)"),
            "(width >= to-rem(768px)) and (width <= to-rem(1023.5px))"
        );
        assert_eq!(
            normalize_media_condition_to_etch("(inline-size > 40px)"),
            "(inline-size > to-rem(40px))"
        );
        let already = "(width <= to-rem(991px))";
        assert_eq!(normalize_media_condition_to_etch(already), already);
    }
}
