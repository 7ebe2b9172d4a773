//! The widget capability contract consumed by the engine, plus a plain snapshot type.
use crate::props::{PropValue, Props};
use crate::types::{Identity, Key};

/// What the engine needs from a widget. Nothing else about a widget is inspected.
pub trait Widget {
    fn identity(&self) -> Identity;

    /// Type tag. A type change under the same identity replaces the node.
    fn widget_type(&self) -> &str;

    fn render_props(&self) -> Props;

    fn children(&self) -> Vec<&dyn Widget>;

    /// Style class identifiers the widget needs beyond its `css_class` prop.
    fn required_css_classes(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Owned widget snapshot, built fresh every cycle.
#[derive(Debug, Clone)]
pub struct WidgetNode {
    widget_type: String,
    identity: Identity,
    props: Props,
    children: Vec<WidgetNode>,
    css_classes: Vec<String>,
}

impl WidgetNode {
    /// Unkeyed node with a freshly generated instance identity.
    pub fn new(widget_type: impl Into<String>) -> Self {
        Self::identified(widget_type, Identity::generate())
    }

    pub fn keyed(widget_type: impl Into<String>, key: impl Into<Key>) -> Self {
        Self::identified(widget_type, Identity::Keyed(key.into()))
    }

    /// Node with an identity decided by the caller, e.g. one read from a host widget.
    pub fn identified(widget_type: impl Into<String>, identity: Identity) -> Self {
        WidgetNode {
            widget_type: widget_type.into(),
            identity,
            props: Props::new(),
            children: Vec::new(),
            css_classes: Vec::new(),
        }
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: WidgetNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = WidgetNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn css_class(mut self, class: impl Into<String>) -> Self {
        self.css_classes.push(class.into());
        self
    }

    pub fn props_mut(&mut self) -> &mut Props {
        &mut self.props
    }

    pub fn children_mut(&mut self) -> &mut Vec<WidgetNode> {
        &mut self.children
    }
}

impl Widget for WidgetNode {
    fn identity(&self) -> Identity {
        self.identity.clone()
    }

    fn widget_type(&self) -> &str {
        &self.widget_type
    }

    fn render_props(&self) -> Props {
        self.props.clone()
    }

    fn children(&self) -> Vec<&dyn Widget> {
        self.children.iter().map(|c| c as &dyn Widget).collect()
    }

    fn required_css_classes(&self) -> Vec<String> {
        self.css_classes.clone()
    }
}
