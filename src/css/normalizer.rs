//! Pure string-to-string CSS clean-up passes.
//!
//! Every function here is total: input that does not match a pattern is returned
//! unchanged, and running a pass over its own output is a no-op.

use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Logical replacements for physical properties, longest names first so the
/// alternation never stops at a shorter prefix.
const LOGICAL_PROPERTIES: &[(&str, &str)] = &[
    ("padding-bottom", "padding-block-end"),
    ("padding-right", "padding-inline-end"),
    ("padding-left", "padding-inline-start"),
    ("padding-top", "padding-block-start"),
    ("margin-bottom", "margin-block-end"),
    ("margin-right", "margin-inline-end"),
    ("margin-left", "margin-inline-start"),
    ("margin-top", "margin-block-start"),
    ("border-bottom", "border-block-end"),
    ("border-right", "border-inline-end"),
    ("border-left", "border-inline-start"),
    ("border-top", "border-block-start"),
    ("min-height", "min-block-size"),
    ("max-height", "max-block-size"),
    ("min-width", "min-inline-size"),
    ("max-width", "max-inline-size"),
    ("height", "block-size"),
    ("width", "inline-size"),
    ("bottom", "inset-block-end"),
    ("right", "inset-inline-end"),
    ("left", "inset-inline-start"),
    ("top", "inset-block-start"),
];

/// Longhand groups collapsed into their shorthand when all four are present,
/// in top/right/bottom/left order.
const QUAD_SHORTHANDS: &[([&str; 4], &str)] = &[
    (
        [
            "inset-block-start",
            "inset-inline-end",
            "inset-block-end",
            "inset-inline-start",
        ],
        "inset",
    ),
    (
        [
            "padding-block-start",
            "padding-inline-end",
            "padding-block-end",
            "padding-inline-start",
        ],
        "padding",
    ),
    (
        [
            "margin-block-start",
            "margin-inline-end",
            "margin-block-end",
            "margin-inline-start",
        ],
        "margin",
    ),
    (
        [
            "border-start-start-radius",
            "border-start-end-radius",
            "border-end-end-radius",
            "border-end-start-radius",
        ],
        "border-radius",
    ),
    (
        [
            "border-top-left-radius",
            "border-top-right-radius",
            "border-bottom-right-radius",
            "border-bottom-left-radius",
        ],
        "border-radius",
    ),
];

const GAP_KEYWORDS: &[&str] = &["normal", "inherit", "initial", "unset", "revert", "revert-layer"];

const CONTENT_KEYWORDS: &[&str] = &[
    "normal",
    "none",
    "open-quote",
    "close-quote",
    "no-open-quote",
    "no-close-quote",
    "inherit",
    "initial",
    "unset",
    "revert",
    "revert-layer",
];

// ─── Final pass ──────────────────────────────────────────────────────────────

/// The last pass applied to every registry entry.
pub fn normalize_final_css(css: &str) -> String {
    let css = normalize_deprecated_hsl_references(css);
    normalize_invalid_grid_placement(&css)
}

/// `grid-column: span 2 / 4` is invalid; rewrite to `grid-column: 2 / 4`.
pub fn normalize_invalid_grid_placement(css: &str) -> String {
    if css.is_empty() || (!css.contains("grid-column") && !css.contains("grid-row")) {
        return css.to_string();
    }

    static GRID_SPAN: OnceLock<Regex> = OnceLock::new();
    let re = GRID_SPAN.get_or_init(|| {
        Regex::new(r"(?i)(grid-column|grid-row)\s*:\s*span\s+(\d+)\s*/\s*([^;]+?)(;|\s*\})").unwrap()
    });
    re.replace_all(css, "$1: $2 / $3$4").into_owned()
}

/// Convert an alpha channel (`0.5`, `50%`, `var(--a)`) into a percentage.
pub fn normalize_alpha_to_percentage(alpha: &str) -> String {
    let value = alpha.trim();
    if value.is_empty() {
        return "100%".to_string();
    }

    if let Some(number) = value.strip_suffix('%') {
        if is_unsigned_decimal(number) {
            return value.to_string();
        }
    }

    match value.parse::<f64>() {
        Ok(mut number) if number.is_finite() => {
            if number <= 1.0 {
                number *= 100.0;
            }
            let clamped = number.clamp(0.0, 100.0);
            format!("{}%", trim_decimal(&format!("{:.4}", clamped)))
        }
        _ => format!("calc({} * 100%)", value),
    }
}

/// Rewrite the deprecated `--token-hsl` color variables.
///
/// - `hsl(var(--primary-hsl) / 0.5)` → `color-mix(in oklab, var(--primary) 50%, transparent)`
/// - `hsl(var(--primary-hsl))` → `var(--primary)`
/// - bare `var(--primary-hsl)` → `var(--primary)`
pub fn normalize_deprecated_hsl_references(css: &str) -> String {
    if css.is_empty() || !css.contains("-hsl") {
        return css.to_string();
    }

    static HSL_CALL: OnceLock<Regex> = OnceLock::new();
    let hsl_call = HSL_CALL.get_or_init(|| {
        Regex::new(r"(?i)hsl\(\s*var\(\s*--([a-z0-9_-]+)-hsl\s*\)\s*(?:/\s*([^)]+))?\)").unwrap()
    });

    let out = hsl_call.replace_all(css, |caps: &Captures| {
        let token = caps[1].to_lowercase();
        let alpha = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        if alpha.is_empty() {
            format!("var(--{})", token)
        } else {
            format!(
                "color-mix(in oklab, var(--{}) {}, transparent)",
                token,
                normalize_alpha_to_percentage(alpha)
            )
        }
    });

    normalize_hsl_tokens(&out)
}

/// Only the bare `var(--x-hsl)` form; used for utility declarations.
pub fn normalize_hsl_tokens(declarations: &str) -> String {
    if declarations.is_empty() || !declarations.contains("-hsl") {
        return declarations.to_string();
    }

    static HSL_VAR: OnceLock<Regex> = OnceLock::new();
    let re = HSL_VAR.get_or_init(|| Regex::new(r"(?i)var\(\s*--([a-z0-9_-]+)-hsl\s*\)").unwrap());
    re.replace_all(declarations, |caps: &Captures| {
        format!("var(--{})", caps[1].to_lowercase())
    })
    .into_owned()
}

// ─── Variable & shorthand clean-up ───────────────────────────────────────────

/// Framework-variable and shorthand clean-up applied to every converted class.
pub fn normalize_css_variables(css: &str) -> String {
    if css.is_empty() {
        return String::new();
    }

    static GAP_IDENT: OnceLock<Regex> = OnceLock::new();
    static ROW_COLUMN_GAP: OnceLock<Regex> = OnceLock::new();
    static COLUMN_ROW_GAP: OnceLock<Regex> = OnceLock::new();
    static FR_CONTAINER_GAP: OnceLock<Regex> = OnceLock::new();
    static FR_CARD_GAP: OnceLock<Regex> = OnceLock::new();
    static FR_CARD_PADDING_DECL: OnceLock<Regex> = OnceLock::new();
    static FR_CARD_PADDING_VAR: OnceLock<Regex> = OnceLock::new();
    static FR_CLASS: OnceLock<Regex> = OnceLock::new();
    static TRANS_VAR: OnceLock<Regex> = OnceLock::new();

    // Gap values that are bare identifiers (not keywords) are leftovers of
    // unresolved framework tokens and are dropped.
    let gap_ident = GAP_IDENT.get_or_init(|| {
        Regex::new(r"(?i)(^|[^a-zA-Z0-9_-])(row-gap|column-gap|gap)\s*:\s*([a-z][a-z0-9_-]*)\s*;")
            .unwrap()
    });
    let css = gap_ident.replace_all(css, |caps: &Captures| {
        let property = caps[2].to_lowercase();
        let value = caps[3].to_lowercase();
        if GAP_KEYWORDS.contains(&value.as_str()) {
            format!("{}{}: {};", &caps[1], property, value)
        } else {
            caps[1].to_string()
        }
    });

    let row_column = ROW_COLUMN_GAP.get_or_init(|| {
        Regex::new(r"(?i)row-gap:\s*([^;{}]+);\s*column-gap:\s*([^;{}]+);").unwrap()
    });
    let column_row = COLUMN_ROW_GAP.get_or_init(|| {
        Regex::new(r"(?i)column-gap:\s*([^;{}]+);\s*row-gap:\s*([^;{}]+);").unwrap()
    });
    let collapse_equal_gaps = |caps: &Captures| {
        if caps[1].trim() == caps[2].trim() {
            format!("gap: {};", caps[1].trim())
        } else {
            caps[0].to_string()
        }
    };
    let css = row_column.replace_all(&css, collapse_equal_gaps);
    let css = column_row.replace_all(&css, collapse_equal_gaps);

    let css = normalize_identical_shorthands(&css);

    let css = FR_CONTAINER_GAP
        .get_or_init(|| Regex::new(r"(?i)var\(\s*--fr-container-gap\s*\)").unwrap())
        .replace_all(&css, "var(--container-gap)");
    let css = FR_CARD_GAP
        .get_or_init(|| Regex::new(r"(?i)var\(\s*--fr-card-gap\s*\)").unwrap())
        .replace_all(&css, "var(--card-gap, var(--content-gap))");
    let css = FR_CARD_PADDING_DECL
        .get_or_init(|| Regex::new(r"(?i)--fr-card-padding\s*:").unwrap())
        .replace_all(&css, "--card-padding:");
    let css = FR_CARD_PADDING_VAR
        .get_or_init(|| Regex::new(r"(?i)var\(\s*--fr-card-padding\s*\)").unwrap())
        .replace_all(&css, "var(--card-padding)");

    let css = css.replace("[class*=brxe-]", "");

    let css = FR_CLASS
        .get_or_init(|| Regex::new(r"\.fr-([a-zA-Z0-9_-])").unwrap())
        .replace_all(&css, ".$1");

    TRANS_VAR
        .get_or_init(|| Regex::new(r"(?i)var\(\s*--([a-z0-9_-]+?)-trans-([0-9]{1,3})\s*\)").unwrap())
        .replace_all(&css, |caps: &Captures| {
            let percent = caps[2].parse::<u32>().unwrap_or(0).min(100);
            format!(
                "color-mix(in oklch, var(--{}) {}%, transparent)",
                caps[1].to_lowercase(),
                percent
            )
        })
        .into_owned()
}

/// Collapse identical longhand quads inside every `{…}` block, or over the whole
/// text when it is a bare declaration list.
pub fn normalize_identical_shorthands(css: &str) -> String {
    if css.is_empty() {
        return String::new();
    }

    static BLOCK: OnceLock<Regex> = OnceLock::new();
    let block = BLOCK.get_or_init(|| Regex::new(r"\{([^{}]*)\}").unwrap());

    let out = block
        .replace_all(css, |caps: &Captures| {
            format!("{{{}}}", collapse_known_quad_shorthands(&caps[1]))
        })
        .into_owned();

    if !out.contains('{') && !out.contains('}') {
        return collapse_known_quad_shorthands(&out);
    }
    out
}

pub fn collapse_known_quad_shorthands(declarations: &str) -> String {
    QUAD_SHORTHANDS
        .iter()
        .fold(declarations.to_string(), |decls, (properties, shorthand)| {
            collapse_quad_shorthand(&decls, properties, shorthand)
        })
}

/// Replace four longhands with one shorthand. All four must be present.
pub fn collapse_quad_shorthand(declarations: &str, properties: &[&str; 4], shorthand: &str) -> String {
    let mut patterns = Vec::with_capacity(4);
    let mut values = Vec::with_capacity(4);

    for property in properties {
        let pattern = format!(r"(?i)(?:^|;)\s*{}\s*:\s*([^;{{}}]+?)\s*;", regex::escape(property));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(_) => return declarations.to_string(),
        };
        match re.captures(declarations) {
            Some(caps) => values.push(caps[1].trim().to_string()),
            None => return declarations.to_string(),
        }
        patterns.push(re);
    }

    let value = build_quad_shorthand_value(&values[0], &values[1], &values[2], &values[3]);

    let mut decls = declarations.to_string();
    for re in &patterns {
        decls = re.replace_all(&decls, ";").into_owned();
    }

    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    static SEMICOLONS: OnceLock<Regex> = OnceLock::new();
    let decls = WHITESPACE
        .get_or_init(|| Regex::new(r"\s+").unwrap())
        .replace_all(&decls, " ");
    let decls = SEMICOLONS
        .get_or_init(|| Regex::new(r";(\s*;)+").unwrap())
        .replace_all(&decls, ";");
    let mut decls = decls.trim().trim_start_matches(';').trim().to_string();

    if !decls.is_empty() && !decls.ends_with(';') {
        decls.push(';');
    }

    format!("{} {}: {};", decls, shorthand, value).trim().to_string()
}

/// The shortest equivalent 1/2/3/4-value shorthand.
pub fn build_quad_shorthand_value(top: &str, right: &str, bottom: &str, left: &str) -> String {
    if top == right && top == bottom && top == left {
        return top.to_string();
    }
    if top == bottom && right == left {
        return format!("{} {}", top, right);
    }
    if right == left {
        return format!("{} {} {}", top, right, bottom);
    }
    format!("{} {} {} {}", top, right, bottom, left)
}

// ─── Value normalizers ───────────────────────────────────────────────────────

/// Unitless border widths gain `px`; zero stays `0`.
pub fn normalize_border_width_value(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        return String::new();
    }

    if value.chars().all(|c| c.is_ascii_digit() || c == '.' || c.is_whitespace()) {
        return value
            .split_whitespace()
            .map(normalize_border_width_component)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
    }

    normalize_border_width_component(value)
}

fn normalize_border_width_component(component: &str) -> String {
    let component = component.trim();
    if component.is_empty() {
        return String::new();
    }
    if is_signed_decimal(component) {
        let zero = component
            .trim_start_matches('-')
            .chars()
            .all(|c| c == '0' || c == '.');
        if zero {
            return "0".to_string();
        }
        return format!("{}px", component);
    }
    component.to_string()
}

/// A bare number gradient stop becomes a percentage.
pub fn normalize_gradient_stop(stop: &str) -> String {
    let stop = stop.trim();
    if is_signed_decimal(stop) {
        return format!("{}%", stop);
    }
    stop.to_string()
}

/// Quote a `content` value unless it is a keyword, a function or already quoted.
pub fn normalize_content_value(value: &str) -> String {
    let content = value.trim();
    if content.is_empty() {
        return String::new();
    }

    let lower = content.to_lowercase();
    if CONTENT_KEYWORDS.contains(&lower.as_str()) {
        return lower;
    }

    static CONTENT_FUNCTION: OnceLock<Regex> = OnceLock::new();
    let function =
        CONTENT_FUNCTION.get_or_init(|| Regex::new(r"(?i)^(attr|counter|counters)\s*\(").unwrap());
    if function.is_match(content) {
        return content.to_string();
    }

    let quoted = content.len() >= 2
        && ((content.starts_with('"') && content.ends_with('"'))
            || (content.starts_with('\'') && content.ends_with('\'')));
    if quoted {
        return content.to_string();
    }

    format!("\"{}\"", content.replace('\\', "\\\\").replace('"', "\\\""))
}

// ─── Selector & property rewrites ────────────────────────────────────────────

/// Replace every `@media` block, nested rules included, with a placeholder.
fn mask_media_blocks(css: &str) -> (String, Vec<String>) {
    let mut masked = String::with_capacity(css.len());
    let mut protected: Vec<String> = Vec::new();
    let mut rest = css;

    while let Some(start) = rest.find("@media") {
        let Some(open) = rest[start..].find('{').map(|offset| start + offset) else {
            break;
        };
        let mut depth = 0usize;
        let mut end = rest.len();
        for (offset, ch) in rest[open..].char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = open + offset + 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        masked.push_str(&rest[..start]);
        masked.push_str(&format!("{{___AT_RULE_{}___}}", protected.len()));
        protected.push(rest[start..end].to_string());
        rest = &rest[end..];
    }
    masked.push_str(rest);
    (masked, protected)
}

/// Physical → logical property names in declaration position. `@media`
/// blocks are left untouched.
pub fn convert_to_logical_properties(css: &str) -> String {
    let css = normalize_css_variables(css);

    static PHYSICAL: OnceLock<Regex> = OnceLock::new();
    let physical = PHYSICAL.get_or_init(|| {
        let names: Vec<&str> = LOGICAL_PROPERTIES.iter().map(|(p, _)| *p).collect();
        Regex::new(&format!(r"(?i)((?:^|[{{}};])\s*)({})\s*:", names.join("|"))).unwrap()
    });

    let (masked, protected) = mask_media_blocks(&css);
    let mut converted = physical
        .replace_all(&masked, |caps: &Captures| {
            let name = caps[2].to_lowercase();
            let logical = LOGICAL_PROPERTIES
                .iter()
                .find(|(p, _)| *p == name)
                .map(|(_, l)| *l)
                .unwrap_or(name.as_str());
            format!("{}{}:", &caps[1], logical)
        })
        .into_owned();

    for (index, original) in protected.iter().enumerate() {
        converted = converted.replace(&format!("{{___AT_RULE_{}___}}", index), original);
    }
    converted
}

/// `#brxe-abc` → `#etch-abc`.
pub fn normalize_id_selectors(css: &str) -> String {
    if css.is_empty() {
        return String::new();
    }
    static BRXE_ID: OnceLock<Regex> = OnceLock::new();
    BRXE_ID
        .get_or_init(|| Regex::new(r"(?i)#brxe-([a-zA-Z0-9_-]+)").unwrap())
        .replace_all(css, "#etch-$1")
        .into_owned()
}

/// For image classes, move `object-fit`/`aspect-ratio` into a nested `img` rule
/// so they apply to the image rather than its wrapper.
pub fn move_image_fit_to_nested_img(class_name: &str, css: &str) -> String {
    let class_name = class_name.trim().to_lowercase();
    if class_name.is_empty() || !class_name.contains("image") {
        return css.to_string();
    }

    let (base_css, media_css) = match css.find("@media") {
        Some(pos) => css.split_at(pos),
        None => (css, ""),
    };

    static NESTED_IMG: OnceLock<Regex> = OnceLock::new();
    static FIT_DECL: OnceLock<Regex> = OnceLock::new();
    static SEMICOLONS: OnceLock<Regex> = OnceLock::new();

    let nested_img = NESTED_IMG.get_or_init(|| Regex::new(r"(?i)\bimg\s*\{").unwrap());
    if base_css.trim().is_empty() || nested_img.is_match(base_css) {
        return css.to_string();
    }

    let fit_decl = FIT_DECL
        .get_or_init(|| Regex::new(r"(?i)\b(object-fit|aspect-ratio)\s*:\s*([^;{}]+?)\s*;").unwrap());

    let mut img_declarations: Vec<String> = Vec::new();
    let mut has_cover = false;
    for caps in fit_decl.captures_iter(base_css) {
        let property = caps[1].to_lowercase();
        let value = caps[2].trim();
        if value.is_empty() {
            continue;
        }
        if property == "object-fit" && value.eq_ignore_ascii_case("cover") {
            has_cover = true;
        }
        let declaration = format!("{}: {};", property, value);
        if !img_declarations.contains(&declaration) {
            img_declarations.push(declaration);
        }
    }

    if img_declarations.is_empty() {
        return css.to_string();
    }

    if has_cover {
        let existing = img_declarations.join(" ");
        if !existing.contains("inline-size") {
            img_declarations.push("inline-size: 100%;".to_string());
        }
        if !existing.contains("block-size") {
            img_declarations.push("block-size: 100%;".to_string());
        }
    }

    let stripped = fit_decl.replace_all(base_css, "");
    let stripped = SEMICOLONS
        .get_or_init(|| Regex::new(r";{2,}").unwrap())
        .replace_all(&stripped, ";");
    let mut base = stripped.trim().to_string();

    let nested = format!("img {{\n  {}\n}}", img_declarations.join("\n  "));
    if base.is_empty() {
        base = nested;
    } else {
        if !base.ends_with(';') && !base.ends_with('}') {
            base.push(';');
        }
        base.push_str("\n\n");
        base.push_str(&nested);
    }

    if media_css.is_empty() {
        base.trim().to_string()
    } else {
        format!("{}\n{}", base, media_css.trim_start()).trim().to_string()
    }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Cheap structural check: balanced braces and parentheses, closed quotes and
/// comments. Returns a description of the first problem found.
pub fn validate_css_syntax(css: &str) -> Result<(), String> {
    let mut braces: i64 = 0;
    let mut parens: i64 = 0;
    let mut quote: Option<char> = None;
    let mut chars = css.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    if inner == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err("unterminated comment".to_string());
                }
            }
            '{' => braces += 1,
            '}' => {
                braces -= 1;
                if braces < 0 {
                    return Err("unexpected '}'".to_string());
                }
            }
            '(' => parens += 1,
            ')' => {
                parens -= 1;
                if parens < 0 {
                    return Err("unexpected ')'".to_string());
                }
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err("unterminated string".to_string());
    }
    if braces != 0 {
        return Err(format!("{} unclosed '{{'", braces));
    }
    if parens != 0 {
        return Err(format!("{} unclosed '('", parens));
    }
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn is_unsigned_decimal(s: &str) -> bool {
    let mut parts = s.splitn(2, '.');
    let int = parts.next().unwrap_or("");
    let frac = parts.next();
    !int.is_empty()
        && int.chars().all(|c| c.is_ascii_digit())
        && frac.map_or(true, |f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()))
}

fn is_signed_decimal(s: &str) -> bool {
    is_unsigned_decimal(s.strip_prefix('-').unwrap_or(s))
}

fn trim_decimal(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_grid_span_repair() {
        assert_eq!(
            normalize_invalid_grid_placement("grid-column: span 2 / 4; color: red;"),
            "grid-column: 2 / 4; color: red;"
        );
        assert_eq!(
            normalize_invalid_grid_placement("a { grid-row: span 3 / -1 }"),
            "a { grid-row: 3 / -1 }"
        );
        assert_eq!(
            normalize_invalid_grid_placement("grid-column: span 2;"),
            "grid-column: span 2;"
        );
    }

    #[test]
    fn test_alpha_to_percentage() {
        assert_eq!(normalize_alpha_to_percentage(""), "100%");
        assert_eq!(normalize_alpha_to_percentage("0.5"), "50%");
        assert_eq!(normalize_alpha_to_percentage("0.125"), "12.5%");
        assert_eq!(normalize_alpha_to_percentage("40%"), "40%");
        assert_eq!(normalize_alpha_to_percentage("250"), "100%");
        assert_eq!(normalize_alpha_to_percentage("var(--a)"), "calc(var(--a) * 100%)");
    }

    #[test]
    fn test_deprecated_hsl() {
        assert_eq!(
            normalize_deprecated_hsl_references("color: hsl(var(--Primary-hsl) / 0.4);"),
            "color: color-mix(in oklab, var(--primary) 40%, transparent);"
        );
        assert_eq!(
            normalize_deprecated_hsl_references("color: hsl(var(--primary-hsl));"),
            "color: var(--primary);"
        );
        assert_eq!(
            normalize_deprecated_hsl_references("--x: var(--base-hsl);"),
            "--x: var(--base);"
        );
    }

    #[test]
    fn test_gap_cleanup() {
        assert_eq!(normalize_css_variables("gap: spacing; color: red;"), " color: red;");
        assert_eq!(normalize_css_variables("gap: normal;"), "gap: normal;");
        assert_eq!(
            normalize_css_variables("row-gap: 1rem; column-gap: 1rem;"),
            "gap: 1rem;"
        );
        assert_eq!(
            normalize_css_variables("row-gap: 1rem; column-gap: 2rem;"),
            "row-gap: 1rem; column-gap: 2rem;"
        );
    }

    #[test]
    fn test_quad_collapse() {
        let css = "padding-block-start: 1rem; padding-inline-end: 2rem; padding-block-end: 1rem; padding-inline-start: 2rem; color: red;";
        assert_eq!(normalize_identical_shorthands(css), "color: red; padding: 1rem 2rem;");

        let nested = ".a { margin-block-start: 0; margin-inline-end: 0; margin-block-end: 0; margin-inline-start: 0; }";
        assert_eq!(normalize_identical_shorthands(nested), ".a {margin: 0;}");

        let partial = "padding-block-start: 1rem; padding-inline-end: 2rem;";
        assert_eq!(normalize_identical_shorthands(partial), partial);
    }

    #[test]
    fn test_build_quad_shorthand_value() {
        assert_eq!(build_quad_shorthand_value("1", "1", "1", "1"), "1");
        assert_eq!(build_quad_shorthand_value("1", "2", "1", "2"), "1 2");
        assert_eq!(build_quad_shorthand_value("1", "2", "3", "2"), "1 2 3");
        assert_eq!(build_quad_shorthand_value("1", "2", "3", "4"), "1 2 3 4");
    }

    #[test]
    fn test_framework_variable_renames() {
        assert_eq!(
            normalize_css_variables("gap: var(--fr-container-gap);"),
            "gap: var(--container-gap);"
        );
        assert_eq!(
            normalize_css_variables("gap: var(--fr-card-gap);"),
            "gap: var(--card-gap, var(--content-gap));"
        );
        assert_eq!(
            normalize_css_variables("--fr-card-padding: 1rem; padding: var(--fr-card-padding);"),
            "--card-padding: 1rem; padding: var(--card-padding);"
        );
        assert_eq!(normalize_css_variables(".fr-hero [class*=brxe-] {}"), ".hero  {}");
        assert_eq!(
            normalize_css_variables("background: var(--primary-trans-20);"),
            "background: color-mix(in oklch, var(--primary) 20%, transparent);"
        );
    }

    #[test]
    fn test_border_width() {
        assert_eq!(normalize_border_width_value("2"), "2px");
        assert_eq!(normalize_border_width_value("0"), "0");
        assert_eq!(normalize_border_width_value("1 0 2"), "1px 0 2px");
        assert_eq!(normalize_border_width_value("thin"), "thin");
        assert_eq!(normalize_border_width_value("0.5em"), "0.5em");
    }

    #[test]
    fn test_gradient_stop_and_content() {
        assert_eq!(normalize_gradient_stop("40"), "40%");
        assert_eq!(normalize_gradient_stop("40px"), "40px");
        assert_eq!(normalize_content_value("NONE"), "none");
        assert_eq!(normalize_content_value("attr(data-x)"), "attr(data-x)");
        assert_eq!(normalize_content_value("'→'"), "'→'");
        assert_eq!(normalize_content_value("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_logical_properties() {
        assert_eq!(
            convert_to_logical_properties("width: 10px; max-width: 20px; top: 0; margin-left: 1rem;"),
            "inline-size: 10px; max-inline-size: 20px; inset-block-start: 0; margin-inline-start: 1rem;"
        );
        let with_media = "height: 1px; @media (max-width: 600px) { .a { height: 2px; } }";
        assert_eq!(
            convert_to_logical_properties(with_media),
            "block-size: 1px; @media (max-width: 600px) { .a { height: 2px; } }"
        );
        assert_eq!(
            convert_to_logical_properties("border-top-width: 1px;"),
            "border-top-width: 1px;"
        );
    }

    #[test]
    fn test_logical_properties_skip_nested_media_and_selectors() {
        let nested = "top: 0; @media (width <= 600px) { .a { left: 0; } .b { right: 0; } } bottom: 0;";
        assert_eq!(
            convert_to_logical_properties(nested),
            "inset-block-start: 0; @media (width <= 600px) { .a { left: 0; } .b { right: 0; } } inset-block-end: 0;"
        );
        assert_eq!(
            convert_to_logical_properties(".left:hover { left: 0; }"),
            ".left:hover { inset-inline-start: 0; }"
        );
        assert_eq!(
            convert_to_logical_properties("&:hover {\n  width: 1px;\n}"),
            "&:hover {\n  inline-size: 1px;\n}"
        );
    }

    #[test]
    fn test_id_selectors() {
        assert_eq!(normalize_id_selectors("#brxe-abc > p {}"), "#etch-abc > p {}");
    }

    #[test]
    fn test_move_image_fit() {
        let css = "object-fit: cover; aspect-ratio: 4/3; border-radius: 8px;";
        assert_eq!(
            move_image_fit_to_nested_img("card-image", css),
            "border-radius: 8px;\n\nimg {\n  object-fit: cover;\n  aspect-ratio: 4/3;\n  inline-size: 100%;\n  block-size: 100%;\n}"
        );
        assert_eq!(move_image_fit_to_nested_img("card", css), css);
    }

    #[test]
    fn test_validate_css_syntax() {
        assert!(validate_css_syntax(".a { content: \"}\"; }").is_ok());
        assert!(validate_css_syntax(".a { color: red;").is_err());
        assert!(validate_css_syntax(".a { background: url(x.png; }").is_err());
        assert!(validate_css_syntax("/* open").is_err());
    }

    #[test]
    fn test_final_normalization_is_idempotent() {
        let css = "color: hsl(var(--primary-hsl) / 0.5); grid-column: span 2 / 4;";
        let once = normalize_final_css(css);
        assert_eq!(normalize_final_css(&once), once);
    }
}
