use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use crate::command::{Command, Node, WidgetId};
use crate::context::RenderContext;
use crate::error::ComponentError;
use crate::props::{PropValue, Props, PropsDiff, CHILDREN_PROP};

pub type ComponentResult = Result<Element, ComponentError>;

/// Adapter for one kind of host widget.
pub trait Widget: 'static {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Zero-argument factory; runs once per instance when its create command
    /// is applied.
    fn create(&self) -> Box<dyn Node>;

    /// Commands bringing the widget in line with `diff`. Called on every
    /// render the instance survives, including with an empty diff.
    fn update(&self, id: WidgetId, diff: &PropsDiff) -> Vec<Command>;

    /// Runs exactly once, inside the widget's destroy command.
    fn destroy(&self, _node: &mut dyn Node) {}
}

/// Composite element type: renders to exactly one element.
pub trait Component: 'static {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn render(&self, props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult;
}

#[derive(Clone)]
pub(crate) enum TypeKind {
    Widget(Rc<dyn Widget>),
    Component(Rc<dyn Component>),
}

/// Type tag of an element. Two tags are equal when they wrap the same Rust
/// type, regardless of the adapter value carried.
#[derive(Clone)]
pub struct ElementType {
    id: TypeId,
    name: &'static str,
    kind: TypeKind,
}

impl ElementType {
    pub fn widget<W: Widget>(widget: W) -> Self {
        Self {
            id: TypeId::of::<W>(),
            name: widget.name(),
            kind: TypeKind::Widget(Rc::new(widget)),
        }
    }

    pub fn component<C: Component>(component: C) -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: component.name(),
            kind: TypeKind::Component(Rc::new(component)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn kind(&self) -> &TypeKind {
        &self.kind
    }
}

impl PartialEq for ElementType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ElementType {}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

struct ElementInner {
    ty: ElementType,
    props: Props,
    key: Option<String>,
    children: Vec<Element>,
}

/// Immutable description of one node for one render pass.
#[derive(Clone)]
pub struct Element {
    inner: Rc<ElementInner>,
}

impl Element {
    pub fn widget<W: Widget>(widget: W) -> ElementBuilder {
        ElementBuilder::new(ElementType::widget(widget))
    }

    pub fn component<C: Component>(component: C) -> ElementBuilder {
        ElementBuilder::new(ElementType::component(component))
    }

    pub fn element_type(&self) -> &ElementType {
        &self.inner.ty
    }

    pub fn props(&self) -> &Props {
        &self.inner.props
    }

    pub fn prop(&self, name: &str) -> Option<&PropValue> {
        self.inner.props.get(name)
    }

    pub fn key(&self) -> Option<&str> {
        self.inner.key.as_deref()
    }

    pub fn children(&self) -> &[Element] {
        &self.inner.children
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.inner.ty.name);
        if let Some(key) = &self.inner.key {
            s.field("key", key);
        }
        for (name, value) in self.inner.props.iter() {
            s.field(name, value);
        }
        if !self.inner.children.is_empty() {
            s.field(CHILDREN_PROP, &self.inner.children);
        }
        s.finish()
    }
}

pub struct ElementBuilder {
    ty: ElementType,
    props: Props,
    key: Option<String>,
    children: Vec<Element>,
}

impl ElementBuilder {
    pub fn new(ty: ElementType) -> Self {
        Self {
            ty,
            props: Props::new(),
            key: None,
            children: Vec::new(),
        }
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        let name = name.into();
        if name == CHILDREN_PROP {
            log::warn!(
                "`{CHILDREN_PROP}` is reserved on {}; use `child`/`children` instead",
                self.ty.name
            );
            return self;
        }
        self.props.insert(name, value.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<E: Into<Element>>(mut self, children: impl IntoIterator<Item = E>) -> Self {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Element {
        Element {
            inner: Rc::new(ElementInner {
                ty: self.ty,
                props: self.props,
                key: self.key,
                children: self.children,
            }),
        }
    }
}

impl From<ElementBuilder> for Element {
    fn from(builder: ElementBuilder) -> Self {
        builder.build()
    }
}
