//! Structured style settings → CSS declaration text.
//!
//! Settings arrive as the builder's flat JSON object (`_display`, `_padding`,
//! `_typography`, …). Keys suffixed with `:<breakpoint>` are responsive variants;
//! any other `:<suffix>` key is a selector variant (`_background:hover`).

use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Map, Value};

use super::breakpoints::{sanitize_key, BreakpointResolver, QuerySyntax};
use super::normalizer::{
    build_quad_shorthand_value, normalize_border_width_value, normalize_content_value,
    normalize_gradient_stop,
};

pub type Settings = Map<String, Value>;

/// Typography keys in emission order; kebab-case wins over camelCase.
const TYPOGRAPHY_PROPERTIES: &[(&str, &str)] = &[
    ("font-size", "fontSize"),
    ("font-weight", "fontWeight"),
    ("font-family", "fontFamily"),
    ("font-style", "fontStyle"),
    ("line-height", "lineHeight"),
    ("letter-spacing", "letterSpacing"),
    ("word-spacing", "wordSpacing"),
    ("text-align", "textAlign"),
    ("text-transform", "textTransform"),
    ("text-decoration", "textDecoration"),
    ("text-indent", "textIndent"),
];

const TYPOGRAPHY_TRAILING: &[(&str, &str)] = &[
    ("vertical-align", "verticalAlign"),
    ("white-space", "whiteSpace"),
];

/// `(setting, property)` pairs copied verbatim when non-empty.
const GRID_CONTAINER: &[(&str, &str)] = &[
    ("_justifyContentGrid", "justify-content"),
    ("_alignItemsGrid", "align-items"),
    ("_justifyItemsGrid", "justify-items"),
    ("_alignContentGrid", "align-content"),
    ("_gridAutoFlow", "grid-auto-flow"),
];

const TRANSFORM_PARTS: &[(&str, &str)] = &[
    ("translateX", "px"),
    ("translateY", "px"),
    ("scaleX", ""),
    ("scaleY", ""),
    ("rotateX", "deg"),
    ("rotateY", "deg"),
    ("rotateZ", "deg"),
    ("skewX", "deg"),
    ("skewY", "deg"),
];

const FILTER_PARTS: &[(&str, &str)] = &[
    ("blur", "px"),
    ("brightness", "%"),
    ("contrast", "%"),
    ("hue-rotate", "deg"),
    ("invert", "%"),
    ("opacity", "%"),
    ("saturate", "%"),
    ("sepia", "%"),
];

const PLAIN_EFFECTS: &[(&str, &str)] = &[
    ("_textShadow", "text-shadow"),
    ("_objectFit", "object-fit"),
    ("_objectPosition", "object-position"),
    ("_isolation", "isolation"),
    ("_cursor", "cursor"),
    ("_mixBlendMode", "mix-blend-mode"),
    ("_pointerEvents", "pointer-events"),
    ("_scrollSnapType", "scroll-snap-type"),
    ("_scrollSnapAlign", "scroll-snap-align"),
    ("_scrollSnapStop", "scroll-snap-stop"),
];

/// Values captured for one box-model property; `direct` is a whole shorthand string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuadValues {
    pub direct: Option<String>,
    pub top: Option<String>,
    pub right: Option<String>,
    pub bottom: Option<String>,
    pub left: Option<String>,
}

pub struct SettingsConverter<'a> {
    breakpoints: &'a BreakpointResolver,
}

impl<'a> SettingsConverter<'a> {
    pub fn new(breakpoints: &'a BreakpointResolver) -> Self {
        Self { breakpoints }
    }

    /// Base declarations for a settings object, followed by nested selector-variant
    /// rules when `include_selector_variants` is set. Declarations are joined by a
    /// single space.
    pub fn convert(&self, settings: &Settings, class_name: &str, include_selector_variants: bool) -> String {
        let mut css: Vec<String> = Vec::new();

        if let Some(content) = present(settings, "_content") {
            let value = normalize_content_value(&content);
            if !value.is_empty() {
                css.push(format!("content: {};", value));
            }
        }

        css.extend(convert_layout(settings));
        css.extend(convert_flexbox(settings));
        css.extend(convert_grid(settings));
        css.extend(convert_sizing(settings));

        if let Some(background) = first_object(settings, &["_background", "background"]) {
            css.extend(convert_background(background));
        }
        if let Some(gradient) = settings.get("_gradient").and_then(Value::as_object) {
            if let Some(declaration) = convert_gradient(gradient) {
                css.push(declaration);
            }
        }
        if let Some(border) = first_object(settings, &["_border", "border"]) {
            css.extend(convert_border(border));
        }
        if let Some(typography) = first_object(settings, &["_typography", "typography"]) {
            css.extend(convert_typography(typography));
        }
        if let Some(spacing) = settings.get("spacing").and_then(Value::as_object) {
            css.extend(convert_spacing(spacing));
        }

        css.extend(convert_margin_padding(settings));
        css.extend(convert_position(settings));
        css.extend(convert_effects(settings));
        css.retain(|declaration| !declaration.is_empty());

        if include_selector_variants {
            let variants = self.convert_selector_variants(settings, class_name);
            if !variants.is_empty() {
                css.push(variants);
            }
        }

        css.join(" ")
    }

    /// `@media` blocks for every `<key>:<breakpoint>` setting, in breakpoint table order.
    pub fn convert_responsive_variants(&self, settings: &Settings, class_name: &str) -> String {
        let mut buckets: IndexMap<String, Settings> = IndexMap::new();

        for (key, value) in settings {
            let Some((base_key, suffix)) = key.rsplit_once(':') else {
                continue;
            };
            if base_key.is_empty() {
                continue;
            }
            let Some(breakpoint) = self.breakpoints.get(suffix) else {
                continue;
            };
            buckets
                .entry(breakpoint.key.clone())
                .or_default()
                .insert(base_key.to_string(), value.clone());
        }

        let mut out = String::new();
        for (key, condition) in self.breakpoints.media_query_map(QuerySyntax::Etch) {
            let Some(bucket) = buckets.get(&key) else {
                continue;
            };
            let css = self.convert(bucket, class_name, true);
            let css = css.trim();
            if css.is_empty() {
                continue;
            }
            let body = css.replace(';', ";\n  ");
            out.push_str(&format!("\n@media {} {{\n  {}\n}}", condition, body.trim_end()));
        }
        out
    }

    /// Nested rules for `<key>:<selector suffix>` settings, grouped by suffix.
    pub fn convert_selector_variants(&self, settings: &Settings, class_name: &str) -> String {
        let detected: Vec<String> = self
            .breakpoints
            .detect_breakpoint_keys(settings)
            .iter()
            .map(|key| sanitize_key(key))
            .filter(|key| !key.is_empty())
            .collect();

        let mut variants: IndexMap<String, Settings> = IndexMap::new();
        for (key, value) in settings {
            if key.starts_with("_cssCustom:") {
                continue;
            }
            let Some(pos) = key.find(':') else {
                continue;
            };
            // `_x:hover:tablet_portrait` belongs to the responsive pass.
            if key
                .rsplit_once(':')
                .is_some_and(|(_, last)| self.breakpoints.is_breakpoint(last))
            {
                continue;
            }
            let (base_key, suffix) = key.split_at(pos);
            if base_key.is_empty() || suffix.len() <= 1 {
                continue;
            }
            let suffix_key = sanitize_key(suffix.trim_start_matches(':'));
            if !suffix_key.is_empty()
                && (detected.contains(&suffix_key) || self.breakpoints.is_breakpoint(&suffix_key))
            {
                continue;
            }
            variants
                .entry(suffix.to_string())
                .or_default()
                .insert(base_key.to_string(), value.clone());
        }

        let mut chunks: Vec<String> = Vec::new();
        for (suffix, values) in &variants {
            let css = self.convert(values, class_name, false);
            let css = css.trim();
            if css.is_empty() {
                continue;
            }
            let selector = normalize_variant_selector_suffix(suffix, class_name);
            if selector.is_empty() {
                continue;
            }
            chunks.push(format!("{} {{\n  {}\n}}", selector, css));
        }
        chunks.join("\n\n")
    }
}

// ─── Selector suffixes ───────────────────────────────────────────────────────

/// Turn a raw variant suffix (`:hover`, ` .child`, `> li`) into a nested `&` selector.
pub fn normalize_variant_selector_suffix(suffix: &str, class_name: &str) -> String {
    let trimmed = suffix.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if !class_name.is_empty() {
        return normalize_selector_suffix_with_ampersand(suffix, class_name);
    }
    if trimmed.starts_with('&') {
        return trimmed.to_string();
    }
    if trimmed.starts_with(['>', '+', '~', '.', '#']) {
        return format!("& {}", trimmed);
    }
    format!("&{}", trimmed)
}

/// Replace references to `.class_name` with `&` and prefix every comma part.
pub fn normalize_selector_suffix_with_ampersand(raw: &str, class_name: &str) -> String {
    let suffix = raw.trim();
    if suffix.is_empty() {
        return String::new();
    }
    let descendant = raw != suffix && raw.starts_with(char::is_whitespace);

    let replaced = match Regex::new(&format!(r"(?i)\.{}\b", regex::escape(class_name))) {
        Ok(re) => re.replace_all(suffix, "&").into_owned(),
        Err(_) => suffix.to_string(),
    };

    let parts: Vec<String> = replaced
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            if part.starts_with('&') {
                part.to_string()
            } else if part.starts_with(['>', '+', '~']) {
                format!("& {}", part)
            } else if part.starts_with(['.', '#']) && descendant {
                format!("& {}", part)
            } else {
                format!("&{}", part)
            }
        })
        .collect();
    parts.join(", ")
}

// ─── Property groups ─────────────────────────────────────────────────────────

pub fn convert_layout(settings: &Settings) -> Vec<String> {
    let mut css = Vec::new();
    for (key, property) in [
        ("_display", "display"),
        ("_overflow", "overflow"),
        ("_overflowX", "overflow-x"),
        ("_overflowY", "overflow-y"),
        ("_visibility", "visibility"),
    ] {
        if let Some(value) = non_empty(settings, key) {
            css.push(declaration(property, &value));
        }
    }
    for (key, property) in [("_opacity", "opacity"), ("_zIndex", "z-index")] {
        if let Some(value) = present(settings, key) {
            css.push(declaration(property, &value));
        }
    }
    css
}

/// Flex container and item properties. A container property without an explicit
/// `_display` implies `display: flex` (and `flex-direction: column` when no
/// direction is given).
pub fn convert_flexbox(settings: &Settings) -> Vec<String> {
    let mut css = Vec::new();
    let mut has_container_property = false;
    let has_display = non_empty(settings, "_display").is_some();

    let direction = non_empty(settings, "_flexDirection").or_else(|| non_empty(settings, "_direction"));
    let has_direction = direction.is_some();
    if let Some(direction) = direction {
        css.push(declaration("flex-direction", &direction));
        has_container_property = true;
    }

    for (key, property) in [
        ("_flexWrap", "flex-wrap"),
        ("_justifyContent", "justify-content"),
        ("_alignItems", "align-items"),
        ("_alignContent", "align-content"),
    ] {
        if let Some(value) = non_empty(settings, key) {
            css.push(declaration(property, &value));
            has_container_property = true;
        }
    }
    for (key, property) in [("_rowGap", "row-gap"), ("_columnGap", "column-gap"), ("_gap", "gap")] {
        if let Some(value) = present(settings, key) {
            css.push(declaration(property, &value));
            has_container_property = true;
        }
    }

    if has_container_property && !has_display {
        let mut injected = vec!["display: flex;".to_string()];
        if !has_direction {
            injected.push("flex-direction: column;".to_string());
        }
        injected.extend(css);
        css = injected;
    }

    for (key, property) in [("_flexGrow", "flex-grow"), ("_flexShrink", "flex-shrink")] {
        if let Some(value) = present(settings, key) {
            css.push(declaration(property, &value));
        }
    }
    for (key, property) in [("_flexBasis", "flex-basis"), ("_alignSelf", "align-self")] {
        if let Some(value) = non_empty(settings, key) {
            css.push(declaration(property, &value));
        }
    }
    if let Some(value) = present(settings, "_order") {
        css.push(declaration("order", &value));
    }
    css
}

/// Grid container properties plus item placement. Explicit start/end lines win
/// over a span.
pub fn convert_grid(settings: &Settings) -> Vec<String> {
    let mut css = Vec::new();
    for (key, property) in [
        ("_gridTemplateColumns", "grid-template-columns"),
        ("_gridTemplateRows", "grid-template-rows"),
    ] {
        if let Some(value) = non_empty(settings, key) {
            css.push(declaration(property, &value));
        }
    }
    for (key, property) in [
        ("_gridGap", "gap"),
        ("_gridColumnGap", "column-gap"),
        ("_gridRowGap", "row-gap"),
    ] {
        if let Some(value) = present(settings, key) {
            css.push(declaration(property, &value));
        }
    }
    for (key, property) in GRID_CONTAINER {
        if let Some(value) = non_empty(settings, key) {
            css.push(declaration(property, &value));
        }
    }

    css.extend(grid_placement(settings, "column", "_gridItemColumnStart", "_gridItemColumnEnd", "_gridItemColumnSpan"));
    css.extend(grid_placement(settings, "row", "_gridItemRowStart", "_gridItemRowEnd", "_gridItemRowSpan"));
    css
}

fn grid_placement(settings: &Settings, axis: &str, start_key: &str, end_key: &str, span_key: &str) -> Vec<String> {
    let start = non_empty(settings, start_key);
    let end = non_empty(settings, end_key);
    if start.is_some() || end.is_some() {
        let mut css = Vec::new();
        if let Some(start) = start {
            css.push(declaration(&format!("grid-{}-start", axis), &start));
        }
        if let Some(end) = end {
            css.push(declaration(&format!("grid-{}-end", axis), &end));
        }
        return css;
    }

    let Some(span) = non_empty(settings, span_key) else {
        return Vec::new();
    };
    let property = format!("grid-{}", axis);
    let value = match span.trim().parse::<f64>() {
        Err(_) => span,
        Ok(n) if n.trunc() == 1.0 => "1".to_string(),
        Ok(_) => format!("span {}", span),
    };
    vec![declaration(&property, &value)]
}

pub fn convert_sizing(settings: &Settings) -> Vec<String> {
    let mut css = Vec::new();

    if let Some(width) = non_empty(settings, "_width") {
        let display = non_empty(settings, "_display").unwrap_or_default().to_lowercase();
        let is_container = matches!(display.as_str(), "flex" | "grid" | "inline-flex" | "inline-grid");
        if is_container && width == "100%" {
            css.push("max-inline-size: 100%;".to_string());
        } else {
            css.push(declaration("inline-size", &width));
        }
    }
    if let Some(height) = non_empty(settings, "_height") {
        css.push(declaration("block-size", &height));
    }

    for (keys, property) in [
        (["_minWidth", "_widthMin"], "min-inline-size"),
        (["_minHeight", "_heightMin"], "min-block-size"),
        (["_maxWidth", "_widthMax"], "max-inline-size"),
        (["_maxHeight", "_heightMax"], "max-block-size"),
    ] {
        if let Some(value) = keys.iter().find_map(|key| non_empty(settings, key)) {
            css.push(declaration(property, &value));
        }
    }

    if let Some(ratio) = non_empty(settings, "_aspectRatio") {
        css.push(declaration("aspect-ratio", &ratio));
    }
    css
}

pub fn convert_background(background: &Settings) -> Vec<String> {
    let mut css = Vec::new();
    if let Some(color) = background.get("color").and_then(color_value) {
        css.push(declaration("background-color", &color));
    }

    let Some(image) = background.get("image").and_then(Value::as_object) else {
        return css;
    };
    let Some(url) = non_empty(image, "url") else {
        return css;
    };
    css.push(format!("background-image: url({});", url));
    for (key, property) in [
        ("size", "background-size"),
        ("position", "background-position"),
        ("repeat", "background-repeat"),
    ] {
        if let Some(value) = non_empty(image, key) {
            css.push(declaration(property, &value));
        }
    }
    css
}

/// A `background-image` gradient from `{type, colors: [{color, stop}]}`.
pub fn convert_gradient(gradient: &Settings) -> Option<String> {
    let colors = gradient.get("colors").and_then(Value::as_array)?;

    let stops: Vec<String> = colors
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| {
            let color = entry.get("color").and_then(color_value)?;
            Some(match non_empty(entry, "stop") {
                Some(stop) => format!("{} {}", color, normalize_gradient_stop(&stop)),
                None => color,
            })
        })
        .collect();
    if stops.is_empty() {
        return None;
    }

    let function = match gradient.get("type").and_then(Value::as_str) {
        Some("radial") => "radial-gradient",
        _ => "linear-gradient",
    };
    Some(format!("background-image: {}({});", function, stops.join(", ")))
}

pub fn convert_border(border: &Settings) -> Vec<String> {
    let mut css = Vec::new();

    match border.get("width") {
        Some(Value::Object(sides)) => {
            let [top, right, bottom, left] = quad_sides(sides).map(|side| {
                let normalized = normalize_border_width_value(&side);
                if normalized.is_empty() {
                    "0".to_string()
                } else {
                    normalized
                }
            });
            css.push(declaration(
                "border-width",
                &build_quad_shorthand_value(&top, &right, &bottom, &left),
            ));
        }
        Some(value) => {
            if let Some(width) = scalar(value).filter(|w| is_filled(w)) {
                css.push(declaration("border-width", &normalize_border_width_value(&width)));
            }
        }
        None => {}
    }

    if let Some(style) = non_empty(border, "style") {
        css.push(declaration("border-style", &style));
    }
    if let Some(color) = border.get("color").and_then(color_value) {
        css.push(declaration("border-color", &color));
    }

    match border.get("radius") {
        Some(Value::Object(sides)) => {
            let [top, right, bottom, left] = quad_sides(sides);
            css.push(declaration(
                "border-radius",
                &build_quad_shorthand_value(&top, &right, &bottom, &left),
            ));
        }
        Some(value) => {
            if let Some(radius) = scalar(value).filter(|r| is_filled(r)) {
                css.push(declaration("border-radius", &radius));
            }
        }
        None => {}
    }
    css
}

pub fn convert_typography(typography: &Settings) -> Vec<String> {
    let mut css = Vec::new();
    let push_pair = |css: &mut Vec<String>, kebab: &str, camel: &str| {
        if let Some(value) = non_empty(typography, kebab).or_else(|| non_empty(typography, camel)) {
            css.push(declaration(kebab, &value));
        }
    };

    for (kebab, camel) in TYPOGRAPHY_PROPERTIES {
        push_pair(&mut css, kebab, camel);
    }
    if let Some(color) = typography.get("color").and_then(color_value) {
        css.push(declaration("color", &color));
    }
    for (kebab, camel) in TYPOGRAPHY_TRAILING {
        push_pair(&mut css, kebab, camel);
    }
    css
}

pub fn convert_spacing(spacing: &Settings) -> Vec<String> {
    ["margin", "padding"]
        .iter()
        .filter_map(|property| non_empty(spacing, property).map(|value| declaration(property, &value)))
        .collect()
}

pub fn convert_margin_padding(settings: &Settings) -> Vec<String> {
    let mut css = Vec::new();
    for property in ["margin", "padding"] {
        let compound = format!("_{}", property);
        let sides = [
            format!("_{}Top", property),
            format!("_{}Right", property),
            format!("_{}Bottom", property),
            format!("_{}Left", property),
        ];
        let values = extract_quad_values(
            settings,
            Some(compound.as_str()),
            [sides[0].as_str(), sides[1].as_str(), sides[2].as_str(), sides[3].as_str()],
        );
        if let Some(direct) = &values.direct {
            css.push(declaration(property, direct));
        }
        css.extend(build_logical_quad_declarations(property, &values));
    }
    css
}

pub fn convert_position(settings: &Settings) -> Vec<String> {
    let mut css = Vec::new();
    if let Some(position) = non_empty(settings, "_position") {
        css.push(declaration("position", &position));
    }
    let inset = extract_quad_values(settings, None, ["_top", "_right", "_bottom", "_left"]);
    css.extend(build_logical_quad_declarations("inset", &inset));
    css
}

pub fn convert_effects(settings: &Settings) -> Vec<String> {
    let mut css = Vec::new();

    match settings.get("_transform") {
        Some(Value::Object(transform)) => {
            let parts: Vec<String> = TRANSFORM_PARTS
                .iter()
                .filter_map(|(function, unit)| {
                    non_empty(transform, function).map(|value| format!("{}({}{})", function, value, unit))
                })
                .collect();
            if !parts.is_empty() {
                css.push(declaration("transform", &parts.join(" ")));
            }
        }
        Some(value) => {
            if let Some(transform) = scalar(value).filter(|t| is_filled(t)) {
                css.push(declaration("transform", &transform));
            }
        }
        None => {}
    }

    if let Some(origin) = non_empty(settings, "_transformOrigin") {
        css.push(declaration("transform-origin", &origin));
    }
    for key in ["_transition", "_cssTransition"] {
        if let Some(transition) = non_empty_str(settings, key) {
            css.push(declaration("transition", &transition));
        }
    }

    if let Some(filters) = settings.get("_cssFilters").and_then(Value::as_object) {
        let parts: Vec<String> = FILTER_PARTS
            .iter()
            .filter_map(|(function, unit)| {
                filters
                    .get(*function)
                    .and_then(scalar)
                    .map(|value| format!("{}({}{})", function, value, unit))
            })
            .collect();
        if !parts.is_empty() {
            css.push(declaration("filter", &parts.join(" ")));
        }
    }
    if let Some(filter) = non_empty_str(settings, "_filter") {
        css.push(declaration("filter", &filter));
    }
    if let Some(filter) = non_empty_str(settings, "_backdropFilter") {
        css.push(declaration("backdrop-filter", &filter));
    }

    if let Some(shadow) = settings.get("_boxShadow") {
        if let Some(box_shadow) = convert_box_shadow(shadow) {
            css.push(box_shadow);
        }
    }

    for (key, property) in PLAIN_EFFECTS {
        if let Some(value) = non_empty(settings, key) {
            css.push(declaration(property, &value));
        }
    }
    css
}

fn convert_box_shadow(shadow: &Value) -> Option<String> {
    let shadow = match shadow {
        Value::Object(shadow) => shadow,
        other => {
            return scalar(other)
                .filter(|s| is_filled(s))
                .map(|s| declaration("box-shadow", &s));
        }
    };
    let values = shadow.get("values").and_then(Value::as_object).filter(|v| !v.is_empty())?;

    let color = shadow.get("color").and_then(color_value).unwrap_or_default();
    let inset = if shadow.get("inset").map(is_truthy).unwrap_or(false) {
        "inset "
    } else {
        ""
    };
    let length = |key: &str| values.get(key).and_then(scalar).unwrap_or_else(|| "0".to_string());

    Some(format!(
        "box-shadow: {}{}px {}px {}px {}px {};",
        inset,
        length("offsetX"),
        length("offsetY"),
        length("blur"),
        length("spread"),
        color
    ))
}

// ─── Box-model helpers ───────────────────────────────────────────────────────

/// Collect the four sides of a box property. A compound object supplies sides,
/// a compound string becomes `direct`; per-side keys always win.
pub fn extract_quad_values(settings: &Settings, compound_key: Option<&str>, side_keys: [&str; 4]) -> QuadValues {
    let mut values = QuadValues::default();

    if let Some(compound) = compound_key.and_then(|key| settings.get(key)) {
        match compound {
            Value::Object(sides) => {
                values.top = present(sides, "top");
                values.right = present(sides, "right");
                values.bottom = present(sides, "bottom");
                values.left = present(sides, "left");
            }
            other => values.direct = scalar(other).filter(|s| !s.is_empty()),
        }
    }

    let [top, right, bottom, left] = side_keys;
    if let Some(v) = present(settings, top) {
        values.top = Some(v);
    }
    if let Some(v) = present(settings, right) {
        values.right = Some(v);
    }
    if let Some(v) = present(settings, bottom) {
        values.bottom = Some(v);
    }
    if let Some(v) = present(settings, left) {
        values.left = Some(v);
    }
    values
}

/// Emit the shortest logical declarations for the captured sides: a full shorthand
/// when all four are set, otherwise `-block`/`-inline` pairs or single sides.
pub fn build_logical_quad_declarations(property: &str, values: &QuadValues) -> Vec<String> {
    let QuadValues {
        top,
        right,
        bottom,
        left,
        ..
    } = values;

    if let (Some(t), Some(r), Some(b), Some(l)) = (top, right, bottom, left) {
        return vec![declaration(property, &build_quad_shorthand_value(t, r, b, l))];
    }

    let mut css = Vec::new();
    match (top, bottom) {
        (Some(t), Some(b)) if t == b => css.push(declaration(&format!("{}-block", property), t)),
        _ => {
            if let Some(t) = top {
                css.push(declaration(&format!("{}-block-start", property), t));
            }
            if let Some(b) = bottom {
                css.push(declaration(&format!("{}-block-end", property), b));
            }
        }
    }
    match (right, left) {
        (Some(r), Some(l)) if r == l => css.push(declaration(&format!("{}-inline", property), r)),
        _ => {
            if let Some(r) = right {
                css.push(declaration(&format!("{}-inline-end", property), r));
            }
            if let Some(l) = left {
                css.push(declaration(&format!("{}-inline-start", property), l));
            }
        }
    }
    css
}

fn quad_sides(sides: &Settings) -> [String; 4] {
    ["top", "right", "bottom", "left"]
        .map(|side| sides.get(side).and_then(scalar).unwrap_or_else(|| "0".to_string()))
}

// ─── Value access ────────────────────────────────────────────────────────────

fn declaration(property: &str, value: &str) -> String {
    format!("{}: {};", property, value)
}

/// Stringify a scalar setting. Arrays, objects and null have no CSS form.
pub(crate) fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some(String::new()),
        _ => None,
    }
}

/// Builder settings treat `""` and `"0"` as unset for most keys.
fn is_filled(value: &str) -> bool {
    !value.is_empty() && value != "0"
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => is_filled(s),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// A setting that is set and neither empty nor zero.
fn non_empty(settings: &Settings, key: &str) -> Option<String> {
    settings.get(key).and_then(scalar).filter(|v| is_filled(v))
}

/// Like [`non_empty`], but only for string values.
fn non_empty_str(settings: &Settings, key: &str) -> Option<String> {
    settings
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| is_filled(v))
        .map(str::to_string)
}

/// A setting that is set and not the empty string; `0` counts.
fn present(settings: &Settings, key: &str) -> Option<String> {
    settings.get(key).and_then(scalar).filter(|v| !v.is_empty())
}

fn first_object<'s>(settings: &'s Settings, keys: &[&str]) -> Option<&'s Settings> {
    keys.iter()
        .filter_map(|key| settings.get(*key))
        .find(|value| is_truthy(value))
        .and_then(Value::as_object)
}

/// A color given either as a plain string or as `{ "raw": … }`.
pub(crate) fn color_value(value: &Value) -> Option<String> {
    let color = match value {
        Value::Object(color) => color.get("raw").and_then(scalar),
        other => scalar(other),
    };
    color.filter(|c| is_filled(c))
}
