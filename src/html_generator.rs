//! Pluggable INSERT stub generation and the default HTML stub generator
use crate::errors::ReconcilerError;
use crate::props::{PropValue, Props};
use crate::types::TargetId;
use phf::phf_map;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Everything a stub generator may look at for one INSERT.
#[derive(Debug, Clone, Copy)]
pub struct StubRequest<'a> {
    pub widget_type: &'a str,
    pub target_id: &'a TargetId,
    pub props: &'a Props,
    /// Classes from `Widget::required_css_classes`, on top of the `css_class` prop.
    pub required_classes: &'a [String],
}

/// Serializes a freshly inserted node into the consumer's stub format.
pub trait StubGenerator: Send + Sync {
    fn generate(&self, request: &StubRequest<'_>) -> Result<String, ReconcilerError>;
}

impl<F> StubGenerator for F
where
    F: Fn(&StubRequest<'_>) -> Result<String, ReconcilerError> + Send + Sync,
{
    fn generate(&self, request: &StubRequest<'_>) -> Result<String, ReconcilerError> {
        self(request)
    }
}

/// Per-type stub generators with an optional catch-all.
#[derive(Clone, Default)]
pub struct StubRegistry {
    by_type: HashMap<String, Arc<dyn StubGenerator>>,
    default: Option<Arc<dyn StubGenerator>>,
}

impl fmt::Debug for StubRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.by_type.keys().collect();
        types.sort();
        f.debug_struct("StubRegistry")
            .field("types", &types)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

impl StubRegistry {
    /// No generators: every INSERT gets the minimal fallback stub.
    pub fn new() -> Self {
        Self::default()
    }

    /// [`HtmlStubGenerator`] as the catch-all.
    pub fn html() -> Self {
        let mut registry = Self::new();
        registry.set_default(HtmlStubGenerator);
        registry
    }

    pub fn register(
        &mut self,
        widget_type: impl Into<String>,
        generator: impl StubGenerator + 'static,
    ) -> &mut Self {
        self.by_type.insert(widget_type.into(), Arc::new(generator));
        self
    }

    pub fn set_default(&mut self, generator: impl StubGenerator + 'static) -> &mut Self {
        self.default = Some(Arc::new(generator));
        self
    }

    pub fn generator_for(&self, widget_type: &str) -> Option<&dyn StubGenerator> {
        self.by_type
            .get(widget_type)
            .or(self.default.as_ref())
            .map(|g| g.as_ref())
    }

    /// Never fails: a missing or failing generator degrades to [`fallback_stub`].
    pub fn render(&self, request: &StubRequest<'_>) -> String {
        let Some(generator) = self.generator_for(request.widget_type) else {
            log::warn!(
                "StubRegistry: no stub generator for '{}', using fallback stub for {}",
                request.widget_type,
                request.target_id
            );
            return fallback_stub(request.widget_type, request.target_id);
        };
        match generator.generate(request) {
            Ok(stub) => stub,
            Err(e) => {
                log::warn!(
                    "StubRegistry: {} (target {}), using fallback stub",
                    e,
                    request.target_id
                );
                fallback_stub(request.widget_type, request.target_id)
            }
        }
    }
}

/// Minimal placeholder emitted when no usable generator exists.
pub fn fallback_stub(widget_type: &str, target_id: &TargetId) -> String {
    format!(
        r#"<div id="{}" data-widget-type="{}"></div>"#,
        html_escape(target_id.as_str()),
        html_escape(widget_type)
    )
}

// Compile-time widget tag lookup (zero allocation)
static WIDGET_TAGS: phf::Map<&'static str, &'static str> = phf_map! {
    "Text" => "p",
    "Image" => "img",
    "Icon" => "i",
    "Spacer" => "div",
    "SizedBox" => "div",
    "TextButton" => "button",
    "ElevatedButton" => "button",
    "IconButton" => "button",
    "FloatingActionButton" => "button",
    "SnackBarAction" => "button",
    "ListTile" => "div",
    "Divider" => "div",
    "Dialog" => "div",
    "AspectRatio" => "div",
    "ClipPath" => "div",
    "Positioned" => "div",
};

/// Consistent HTML attribute escaping
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn css_value(value: &PropValue) -> String {
    match value {
        PropValue::Str(s) => s.clone(),
        PropValue::Int(i) => i.to_string(),
        PropValue::Float(f) => f.to_string(),
        other => other.to_json().to_string(),
    }
}

/// Numbers get a `px` unit, strings pass through.
fn css_length(value: &PropValue) -> String {
    match value.as_f64() {
        Some(num) => format!("{}px", num),
        None => css_value(value),
    }
}

/// HTML stub generator for the built-in widget types. Unknown types render as
/// a `div` carrying classes, inline style, attributes and click handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlStubGenerator;

impl HtmlStubGenerator {
    fn tag(widget_type: &str, props: &Props) -> &'static str {
        let is_img_icon = widget_type == "Icon"
            && props.get("render_type").and_then(PropValue::as_str) == Some("img");
        if is_img_icon {
            return "img";
        }
        WIDGET_TAGS.get(widget_type).copied().unwrap_or("div")
    }

    fn classes(request: &StubRequest<'_>) -> String {
        let mut classes: Vec<&str> = request
            .props
            .get("css_class")
            .and_then(PropValue::as_str)
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default();
        for class in request.required_classes {
            if !classes.contains(&class.as_str()) {
                classes.push(class);
            }
        }
        // Font icons carry their glyph as a class
        if request.widget_type == "Icon"
            && request.props.get("render_type").and_then(PropValue::as_str) != Some("img")
        {
            if let Some(icon) = request.props.get("data").and_then(PropValue::as_str) {
                classes.push(icon);
            }
        }
        classes.join(" ")
    }

    fn inline_styles(widget_type: &str, props: &Props) -> Vec<String> {
        let mut styles = Vec::new();
        let mut push = |name: &str, value: String| styles.push(format!("{}: {}", name, value));

        match widget_type {
            "ClipPath" => {
                for (prop, css) in [
                    ("width", "width"),
                    ("height", "height"),
                    ("clip_path_string", "clip-path"),
                    ("aspectRatio", "aspect-ratio"),
                ] {
                    if let Some(v) = props.get(prop) {
                        push(css, css_value(v));
                    }
                }
            }
            "SizedBox" => {
                if let Some(w) = props.get("width") {
                    push("width", css_length(w));
                }
                if let Some(h) = props.get("height") {
                    push("height", css_length(h));
                }
            }
            "Divider" => {
                push("width", "100%".to_string());
                if let Some(h) = props.get("height") {
                    push("height", css_length(h));
                }
                if let Some(color) = props.get("color") {
                    push("background-color", css_value(color));
                }
                if let Some(margin) = props.get("margin") {
                    push("margin", css_value(margin));
                }
            }
            "AspectRatio" => {
                if let Some(ratio) = props.get("aspectRatio") {
                    push("aspect-ratio", css_value(ratio));
                }
            }
            "Positioned" => {
                for prop in ["top", "bottom", "left", "right", "width", "height"] {
                    if let Some(v) = props.get(prop) {
                        push(prop, css_length(v));
                    }
                }
            }
            _ => {}
        }

        if let Some(style) = props.get("style").and_then(PropValue::as_map) {
            for (key, value) in style {
                push(&key.replace('_', "-"), css_value(value));
            }
        }
        if let Some(pos) = props.get("position_type").and_then(PropValue::as_str) {
            push("position", pos.to_string());
        }
        styles
    }

    fn click_handler(props: &Props) -> Option<String> {
        if props.get("enabled").and_then(PropValue::as_bool) == Some(false) {
            return None;
        }
        let named = |prop: &str| {
            props
                .get(prop)
                .and_then(PropValue::as_str)
                .filter(|name| !name.is_empty())
        };
        if let Some(name) = named("onPressedName").or_else(|| named("onTapName")) {
            return Some(format!("handleClick('{}')", name));
        }
        named("onItemTapName").map(|name| {
            let index = props
                .get("item_index")
                .and_then(PropValue::as_f64)
                .map(|i| i as i64)
                .unwrap_or(-1);
            format!("handleItemTap('{}', {})", name, index)
        })
    }
}

impl StubGenerator for HtmlStubGenerator {
    fn generate(&self, request: &StubRequest<'_>) -> Result<String, ReconcilerError> {
        let props = request.props;
        let tag = Self::tag(request.widget_type, props);
        let classes = Self::classes(request);
        let mut attrs = String::new();

        let styles = Self::inline_styles(request.widget_type, props);
        if !styles.is_empty() {
            attrs.push_str(&format!(r#" style="{}""#, html_escape(&styles.join("; "))));
        }

        if let Some(attributes) = props.get("attributes").and_then(PropValue::as_map) {
            for (key, value) in attributes {
                attrs.push_str(&format!(
                    r#" {}="{}""#,
                    html_escape(key),
                    html_escape(&css_value(value))
                ));
            }
        }

        if let Some(handler) = Self::click_handler(props) {
            attrs.push_str(&format!(r#" onclick="{}""#, html_escape(&handler)));
        }

        if let Some(tooltip) = props.get("tooltip").and_then(PropValue::as_str) {
            attrs.push_str(&format!(r#" title="{}""#, html_escape(tooltip)));
        }

        let src_prop = match (request.widget_type, tag) {
            ("Image", _) => Some("src"),
            ("Icon", "img") => Some("custom_icon_src"),
            _ => None,
        };
        if let Some(src_prop) = src_prop {
            let src = props.get(src_prop).and_then(PropValue::as_str).unwrap_or("");
            attrs.push_str(&format!(r#" src="{}" alt="""#, html_escape(src)));
        }

        let id = html_escape(request.target_id.as_str());
        let classes = html_escape(&classes);
        if ["img", "hr", "br"].contains(&tag) {
            return Ok(format!(r#"<{tag} id="{id}" class="{classes}"{attrs}>"#));
        }

        let inner = match request.widget_type {
            "Text" => props.get("data").map(css_value).unwrap_or_default(),
            _ => props
                .get("inner_html")
                .and_then(PropValue::as_str)
                .unwrap_or("")
                .to_string(),
        };
        Ok(format!(
            r#"<{tag} id="{id}" class="{classes}"{attrs}>{inner}</{tag}>"#,
            inner = html_escape(&inner)
        ))
    }
}
