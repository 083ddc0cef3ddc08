//! Leaf converters for text, media and link elements.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use url::Url;

use super::blocks::{BlockNode, ElementBlock, SvgBlock};
use super::labels::plain_text;
use super::structural::resolve_element_tag;
use super::ConvertContext;
use crate::css::settings::{is_truthy, scalar};
use crate::css::Settings;
use crate::diagnostics::DiagnosticKind;
use crate::document::SourceElement;

const IFRAME_STYLE: &str = "etch-iframe-style";
const IFRAME_ALLOW: &str = "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture";
const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

const BUTTON_STYLES: &[(&str, &str)] = &[
    ("primary", "btn--primary"),
    ("secondary", "btn--secondary"),
    ("outline", "btn--outline"),
    ("text", "btn--text"),
];

const VIDEO_MIME_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("ogg", "video/ogg"),
    ("ogv", "video/ogg"),
];

// ─── Setting access ──────────────────────────────────────────────────────────

/// A string setting; other value types count as absent.
fn string_setting(settings: &Settings, key: &str) -> Option<String> {
    settings.get(key).and_then(Value::as_str).map(str::to_string)
}

fn object_setting<'s>(settings: &'s Settings, key: &str) -> Option<&'s Settings> {
    settings.get(key).and_then(Value::as_object)
}

/// A scalar setting that is set and not the empty string.
fn present(settings: &Settings, key: &str) -> Option<String> {
    settings.get(key).and_then(scalar).filter(|v| !v.is_empty())
}

fn strip_trailing_nbsp(text: &str) -> String {
    static NBSP: OnceLock<Regex> = OnceLock::new();
    let nbsp = NBSP.get_or_init(|| Regex::new(r"(?:\x{A0}|&nbsp;|&#160;)+$").unwrap());
    nbsp.replace(text, "").into_owned()
}

fn starts_with_block_markup(text: &str) -> bool {
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    let block = BLOCK.get_or_init(|| {
        Regex::new(r"(?i)^\s*<(?:p|h[1-6]|ul|ol|div|section|article|aside|header|footer|nav|blockquote|pre|hr|table)[\s>/]")
            .unwrap()
    });
    block.is_match(text)
}

/// Link target and new-tab flag from a `link` setting given as a plain url
/// or as `{ url, newTab }`. Missing or empty urls become `#`.
fn link_target(settings: &Settings) -> (String, bool) {
    let (url, new_tab) = match settings.get("link") {
        Some(Value::Object(link)) => (
            link.get("url").and_then(scalar).unwrap_or_default(),
            link.get("newTab").map(is_truthy).unwrap_or(false),
        ),
        Some(other) => (scalar(other).unwrap_or_default(), false),
        None => (String::new(), false),
    };
    if url.trim().is_empty() {
        ("#".to_string(), new_tab)
    } else {
        (url, new_tab)
    }
}

fn link_block(block: ElementBlock, href: String, new_tab: bool, class: &str) -> ElementBlock {
    let block = block.attribute("href", href).class(class);
    if new_tab {
        block.attribute("target", "_blank").attribute("rel", "noopener noreferrer")
    } else {
        block
    }
}

// ─── Text ────────────────────────────────────────────────────────────────────

/// `text` and `text-basic`. Content is kept as markup; rich text that opens
/// with a block-level tag is wrapped in a `div` instead of a `p`.
pub fn convert_text(element: &SourceElement, ctx: &mut ConvertContext) -> Option<BlockNode> {
    let text = string_setting(&element.settings, "text").or_else(|| element.inline_content.clone())?;
    let text = strip_trailing_nbsp(text.trim());
    if text.trim().is_empty() {
        return None;
    }
    let text = ctx.dynamic(&text, element);

    let fallback_tag = if starts_with_block_markup(&text) { "div" } else { "p" };
    let resolved = ctx.resolve(element);
    let block = ElementBlock::new(ctx.type_label(element), resolve_element_tag(&element.settings, fallback_tag))
        .class(&resolved.class_names)
        .styles(&resolved.style_ids)
        .raw(text);
    Some(block.into())
}

pub fn convert_heading(element: &SourceElement, ctx: &mut ConvertContext) -> Option<BlockNode> {
    let text = plain_text(&string_setting(&element.settings, "text").unwrap_or_default());
    if text.is_empty() {
        return None;
    }
    let text = ctx.dynamic(&text, element);

    let tag = resolve_element_tag(&element.settings, "h2");
    let tag = if HEADING_TAGS.contains(&tag.as_str()) { tag } else { "h2".to_string() };
    let resolved = ctx.resolve(element);
    let block = ElementBlock::new(ctx.label(element, "Heading"), tag)
        .class(&resolved.class_names)
        .styles(&resolved.style_ids)
        .raw(text);
    Some(block.into())
}

// ─── Media ───────────────────────────────────────────────────────────────────

/// `figure` > `img`, plus a `figcaption` when a caption is set.
pub fn convert_image(element: &SourceElement, ctx: &mut ConvertContext) -> Option<BlockNode> {
    let settings = &element.settings;
    let image = object_setting(settings, "image");
    let url = image
        .and_then(|image| image.get("url"))
        .and_then(scalar)
        .or_else(|| image.and_then(|image| string_setting(image, "useDynamicData")))
        .unwrap_or_default();
    if url.trim().is_empty() {
        return None;
    }
    let url = ctx.dynamic(url.trim(), element);

    let alt = string_setting(settings, "alt")
        .or_else(|| image.and_then(|image| string_setting(image, "alt")))
        .unwrap_or_default();
    let alt = ctx.dynamic(&alt, element);
    let image_id = image
        .and_then(|image| image.get("id"))
        .and_then(scalar)
        .and_then(|id| id.trim().parse::<u64>().ok())
        .filter(|id| *id > 0);

    let mut img = ElementBlock::new("Image", "img").attribute("src", url).attribute("alt", alt);
    if let Some(id) = image_id {
        img = img.attribute("data-id", id.to_string());
    }
    let mut inner: Vec<BlockNode> = vec![img.into()];

    let caption = string_setting(settings, "caption").unwrap_or_default();
    if !caption.trim().is_empty() {
        let caption = ctx.dynamic(caption.trim(), element);
        inner.push(ElementBlock::new("Caption", "figcaption").raw(caption).into());
    }

    let resolved = ctx.resolve(element);
    let figure = ElementBlock::new(ctx.label(element, "Image"), "figure")
        .class(&resolved.class_names)
        .styles(&resolved.style_ids)
        .children(inner);
    Some(figure.into())
}

/// Icon library entries. Inline svg icons keep their markup as `src`; font
/// icons become an empty svg so that no icon-font classes carry over.
pub fn convert_icon(element: &SourceElement, ctx: &mut ConvertContext) -> Option<BlockNode> {
    let icon = object_setting(&element.settings, "icon")?;
    let library = icon.get("library").and_then(scalar).unwrap_or_default();
    let value = ["icon", "value"]
        .iter()
        .find_map(|key| icon.get(*key).and_then(scalar))
        .unwrap_or_default();
    let svg = match icon.get("svg") {
        Some(Value::Object(svg)) => svg.get("url").and_then(scalar).unwrap_or_default(),
        Some(other) => scalar(other).unwrap_or_default(),
        None => String::new(),
    };
    if value.trim().is_empty() && svg.trim().is_empty() {
        return None;
    }

    let resolved = ctx.resolve(element);
    if !svg.trim().is_empty() || library.contains("svg") {
        let mut block = SvgBlock {
            metadata_name: Some(ctx.label(element, "Icon")),
            style_ids: resolved.style_ids,
            ..SvgBlock::default()
        };
        block.attributes.insert("src".to_string(), svg);
        block.attributes.insert("stripColors".to_string(), "true".to_string());
        if !resolved.class_names.is_empty() {
            block.attributes.insert("class".to_string(), resolved.class_names);
        }
        return Some(BlockNode::Svg(block));
    }

    Some(BlockNode::Svg(SvgBlock {
        tag: Some("svg".to_string()),
        style_ids: resolved.style_ids,
        ..SvgBlock::default()
    }))
}

/// File and icon-set svgs. Inline code and dynamic sources have no url to
/// point at and are dropped.
pub fn convert_svg(element: &SourceElement, ctx: &mut ConvertContext) -> Option<BlockNode> {
    let settings = &element.settings;
    let source = string_setting(settings, "source").unwrap_or_else(|| "file".to_string());
    let url = match source.as_str() {
        "file" => object_setting(settings, "file").and_then(|file| file.get("url")).and_then(scalar),
        "iconSet" => object_setting(settings, "iconSet")
            .and_then(|set| object_setting(set, "svg"))
            .and_then(|svg| svg.get("url"))
            .and_then(scalar),
        "code" => {
            ctx.report(
                DiagnosticKind::UnsupportedCode,
                element,
                "inline svg code cannot be converted without a media upload",
            );
            None
        }
        "dynamicData" => {
            ctx.report(DiagnosticKind::UnsupportedElement, element, "svg from dynamic data is not supported");
            None
        }
        other => {
            log::debug!("svg {} has unknown source '{}'", element.id, other);
            None
        }
    };
    let url = url.filter(|url| !url.trim().is_empty())?;

    let resolved = ctx.resolve(element);
    let mut block = SvgBlock {
        tag: Some("svg".to_string()),
        style_ids: resolved.style_ids,
        ..SvgBlock::default()
    };
    block.attributes.insert("src".to_string(), url);
    for key in ["width", "height"] {
        if let Some(value) = settings.get(key).filter(|v| is_truthy(v)).and_then(scalar) {
            block.attributes.insert(key.to_string(), value);
        }
    }
    for (key, attribute) in [("fill", "fill"), ("stroke", "stroke"), ("strokeWidth", "stroke-width")] {
        if let Some(value) = present(settings, key) {
            block.attributes.insert(attribute.to_string(), value);
        }
    }
    if !resolved.class_names.is_empty() {
        block.attributes.insert("class".to_string(), resolved.class_names);
    }
    Some(BlockNode::Svg(block))
}

// ─── Video ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoProvider {
    YouTube,
    Vimeo,
}

impl VideoProvider {
    fn key(self) -> &'static str {
        match self {
            VideoProvider::YouTube => "youtube",
            VideoProvider::Vimeo => "vimeo",
        }
    }

    fn label(self) -> &'static str {
        match self {
            VideoProvider::YouTube => "Video (YouTube)",
            VideoProvider::Vimeo => "Video (Vimeo)",
        }
    }

    fn embed_url(self, video_id: &str, settings: &Settings) -> String {
        let flag = |key: &str| if settings.get(key).map(is_truthy).unwrap_or(false) { "1" } else { "0" };
        match self {
            VideoProvider::YouTube => format!(
                "https://www.youtube.com/embed/{}?autoplay={}&loop={}&muted={}&controls={}",
                video_id,
                flag("autoplay"),
                flag("loop"),
                flag("muted"),
                flag("controls")
            ),
            VideoProvider::Vimeo => format!(
                "https://player.vimeo.com/video/{}?autoplay={}&loop={}&muted={}",
                video_id,
                flag("autoplay"),
                flag("loop"),
                flag("muted")
            ),
        }
    }
}

/// Video id from the provider setting, `videoId`, or a pasted url.
fn video_id(settings: &Settings, provider: VideoProvider) -> Option<String> {
    let raw = settings.get(provider.key()).or_else(|| settings.get("videoId"))?;
    let raw = match raw {
        Value::Object(map) => ["id", "videoId"].iter().find_map(|key| map.get(*key).and_then(Value::as_str)),
        other => other.as_str(),
    }?
    .trim();
    if raw.is_empty() {
        return None;
    }
    if !raw.starts_with("http://") && !raw.starts_with("https://") {
        return Some(raw.to_string());
    }

    let url = Url::parse(raw).ok()?;
    if provider == VideoProvider::YouTube {
        let from_query = url
            .query_pairs()
            .find(|(key, value)| key == "v" && !value.is_empty())
            .map(|(_, value)| value.into_owned());
        if from_query.is_some() {
            return from_query;
        }
    }
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

fn video_mime_type(url: &str) -> &'static str {
    let path = Url::parse(url)
        .map(|parsed| parsed.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    let file = path.rsplit('/').next().unwrap_or_default();
    let extension = file
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    VIDEO_MIME_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
        .unwrap_or("video/mp4")
}

fn video_url(settings: &Settings, video_type: &str) -> String {
    if video_type == "file" {
        return settings.get("url").and_then(scalar).unwrap_or_default();
    }
    object_setting(settings, "media")
        .and_then(|media| string_setting(media, "url"))
        .unwrap_or_default()
}

fn video_description(settings: &Settings) -> String {
    let overlay = object_setting(settings, "overlay").and_then(|overlay| string_setting(overlay, "content"));
    ["alt", "caption", "title"]
        .iter()
        .map(|key| string_setting(settings, key))
        .chain(std::iter::once(overlay))
        .flatten()
        .find(|text| !text.trim().is_empty())
        .unwrap_or_default()
}

/// YouTube and Vimeo become an `iframe`; media and file videos a `figure`
/// holding a hidden caption and a `video` with one `source`.
pub fn convert_video(element: &SourceElement, ctx: &mut ConvertContext) -> Option<BlockNode> {
    let settings = &element.settings;
    let video_type = string_setting(settings, "videoType").unwrap_or_else(|| "media".to_string());
    let width = settings.get("width").and_then(scalar).unwrap_or_else(|| "640".to_string());
    let height = settings.get("height").and_then(scalar).unwrap_or_else(|| "360".to_string());

    let provider = match video_type.as_str() {
        "youtube" => Some(VideoProvider::YouTube),
        "vimeo" => Some(VideoProvider::Vimeo),
        "media" | "file" => None,
        other => {
            log::debug!("video {} has unknown type '{}'", element.id, other);
            return None;
        }
    };

    let resolved = ctx.resolve(element);
    if let Some(provider) = provider {
        let id = video_id(settings, provider)?;
        let iframe = ElementBlock::new(provider.label(), "iframe")
            .attribute("data-etch-element", "iframe")
            .attribute("src", provider.embed_url(&id, settings))
            .attribute("width", width)
            .attribute("height", height)
            .attribute("frameborder", "0")
            .attribute("allow", IFRAME_ALLOW)
            .attribute("allowfullscreen", "true")
            .class(&resolved.class_names)
            .styles(&resolved.style_ids)
            .prepend_style(IFRAME_STYLE);
        return Some(iframe.into());
    }

    let url = video_url(settings, &video_type);
    if url.trim().is_empty() {
        return None;
    }
    let url = ctx.dynamic(url.trim(), element);
    let description = ctx.dynamic(&video_description(settings), element);

    let mut video = ElementBlock::new("Video Element", "video")
        .attribute("width", width)
        .attribute("height", height)
        .attribute("preload", "metadata")
        .attribute("playsinline", "true");
    for flag in ["autoplay", "loop", "muted"] {
        if settings.get(flag).map(is_truthy).unwrap_or(false) {
            video = video.attribute(flag, "true");
        }
    }
    if settings.get("controls").map(is_truthy).unwrap_or(true) {
        video = video.attribute("controls", "true");
    }
    if let Some(poster) = object_setting(settings, "poster")
        .and_then(|poster| string_setting(poster, "url"))
        .filter(|poster| !poster.trim().is_empty())
    {
        video = video.attribute("poster", poster);
    }

    let mime = video_mime_type(&url);
    let source = ElementBlock::new("Video Source", "source")
        .attribute("src", url)
        .attribute("type", mime);
    let video = video.children(vec![source.into()]);
    let caption = ElementBlock::new("Video Caption", "figcaption")
        .attribute("class", "hidden-accessible")
        .raw(description);

    let figure_class = format!("media {}", resolved.class_names);
    let figure = ElementBlock::new(ctx.label(element, "Video"), "figure")
        .class(&figure_class)
        .styles(&resolved.style_ids)
        .children(vec![caption.into(), video.into()]);
    Some(figure.into())
}

// ─── Links ───────────────────────────────────────────────────────────────────

/// The button style as a `btn--` class, appended after the resolved classes.
fn button_class(style: &str, classes: &str) -> String {
    let button = if style.starts_with("btn--") {
        style.to_string()
    } else {
        BUTTON_STYLES
            .iter()
            .find(|(name, _)| *name == style)
            .map(|(_, class)| class.to_string())
            .unwrap_or_else(|| "btn--primary".to_string())
    };
    if classes.is_empty() {
        button
    } else {
        format!("{} {}", classes, button)
    }
}

pub fn convert_button(element: &SourceElement, ctx: &mut ConvertContext) -> BlockNode {
    let settings = &element.settings;
    let text = string_setting(settings, "text").unwrap_or_default();
    let text = ctx.dynamic(&text, element);
    let (href, new_tab) = link_target(settings);
    let href = ctx.dynamic(&href, element);
    let style = string_setting(settings, "style").unwrap_or_else(|| "primary".to_string());

    let resolved = ctx.resolve(element);
    let class = button_class(&style, &resolved.class_names);
    let block = ElementBlock::new(ctx.label(element, "Button"), "a");
    link_block(block, href, new_tab, &class)
        .styles(&resolved.style_ids)
        .raw(text)
        .into()
}

pub fn convert_text_link(element: &SourceElement, ctx: &mut ConvertContext) -> BlockNode {
    let settings = &element.settings;
    let text = settings.get("text").and_then(scalar).unwrap_or_default();
    let text = ctx.dynamic(&text, element);
    let (href, new_tab) = link_target(settings);
    let href = ctx.dynamic(&href, element);

    let resolved = ctx.resolve(element);
    let block = ElementBlock::new(ctx.label(element, "Text Link"), "a");
    link_block(block, href, new_tab, &resolved.class_names)
        .styles(&resolved.style_ids)
        .raw(text)
        .into()
}
