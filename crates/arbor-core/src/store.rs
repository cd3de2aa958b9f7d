use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::collections::map::HashMap;
use crate::command::WidgetId;
use crate::element::Element;
use crate::path::InstancePath;
use crate::props::{PropValue, Props};

/// Shared liveness flag of one instance. Flipped once, when the render pass
/// that removed the instance commits.
#[derive(Clone, Debug)]
pub struct MountToken(Arc<AtomicBool>);

impl MountToken {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn unmount(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub type Cleanup = Box<dyn FnOnce()>;
pub(crate) type EffectCell = Rc<RefCell<Option<Cleanup>>>;

#[derive(Clone)]
pub(crate) enum HookSlot {
    State { field: String },
    Memo { deps: Vec<PropValue>, value: PropValue },
    Ref(Rc<dyn Any>),
    Effect {
        deps: Option<Vec<PropValue>>,
        cleanup: EffectCell,
    },
}

impl HookSlot {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            HookSlot::State { .. } => "use_state",
            HookSlot::Memo { .. } => "use_memo",
            HookSlot::Ref(_) => "use_ref",
            HookSlot::Effect { .. } => "use_effect",
        }
    }
}

#[derive(Clone)]
pub(crate) enum InstanceKind {
    Host {
        widget: WidgetId,
    },
    Component {
        state: IndexMap<String, PropValue>,
        hooks: Vec<HookSlot>,
    },
}

/// Long-lived record behind one stable path.
#[derive(Clone)]
pub struct Instance {
    pub(crate) path: InstancePath,
    pub(crate) element: Element,
    pub(crate) kind: InstanceKind,
    pub(crate) children: Vec<InstancePath>,
    pub(crate) generation: u64,
    pub(crate) token: MountToken,
}

impl Instance {
    pub(crate) fn host(path: InstancePath, element: Element, widget: WidgetId, generation: u64) -> Self {
        Self {
            path,
            element,
            kind: InstanceKind::Host { widget },
            children: Vec::new(),
            generation,
            token: MountToken::new(),
        }
    }

    pub(crate) fn component(path: InstancePath, element: Element, generation: u64) -> Self {
        Self {
            path,
            element,
            kind: InstanceKind::Component {
                state: IndexMap::new(),
                hooks: Vec::new(),
            },
            children: Vec::new(),
            generation,
            token: MountToken::new(),
        }
    }

    pub fn path(&self) -> &InstancePath {
        &self.path
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn props(&self) -> &Props {
        self.element.props()
    }

    pub fn widget(&self) -> Option<WidgetId> {
        match self.kind {
            InstanceKind::Host { widget } => Some(widget),
            InstanceKind::Component { .. } => None,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self.kind, InstanceKind::Component { .. })
    }

    pub fn state(&self, field: &str) -> Option<&PropValue> {
        match &self.kind {
            InstanceKind::Component { state, .. } => state.get(field),
            InstanceKind::Host { .. } => None,
        }
    }

    pub fn children(&self) -> &[InstancePath] {
        &self.children
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &MountToken {
        &self.token
    }

    pub(crate) fn effect_cells(&self) -> Vec<EffectCell> {
        match &self.kind {
            InstanceKind::Component { hooks, .. } => hooks
                .iter()
                .filter_map(|hook| match hook {
                    HookSlot::Effect { cleanup, .. } => Some(Rc::clone(cleanup)),
                    _ => None,
                })
                .collect(),
            InstanceKind::Host { .. } => Vec::new(),
        }
    }
}

/// Path-keyed instance registry, owned by one scheduler.
#[derive(Default)]
pub struct InstanceStore {
    entries: HashMap<InstancePath, Instance>,
    next_generation: u64,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &InstancePath) -> Option<&Instance> {
        self.entries.get(path)
    }

    pub(crate) fn get_mut(&mut self, path: &InstancePath) -> Option<&mut Instance> {
        self.entries.get_mut(path)
    }

    pub fn contains(&self, path: &InstancePath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every live path, sorted.
    pub fn paths(&self) -> Vec<InstancePath> {
        let mut paths: Vec<_> = self.entries.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub(crate) fn insert(&mut self, instance: Instance) -> Option<Instance> {
        self.entries.insert(instance.path.clone(), instance)
    }

    pub(crate) fn remove(&mut self, path: &InstancePath) -> Option<Instance> {
        self.entries.remove(path)
    }

    pub(crate) fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Host widget that represents `path` inside its host parent: the widget
    /// itself, or the widget of a component's rendered root.
    pub fn host_widget(&self, path: &InstancePath) -> Option<WidgetId> {
        let mut current = self.entries.get(path)?;
        loop {
            match current.kind {
                InstanceKind::Host { widget } => return Some(widget),
                InstanceKind::Component { .. } => {
                    current = self.entries.get(current.children.first()?)?;
                }
            }
        }
    }

    pub(crate) fn host_children(&self, path: &InstancePath) -> Vec<WidgetId> {
        self.entries
            .get(path)
            .map(|instance| {
                instance
                    .children
                    .iter()
                    .filter_map(|child| self.host_widget(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nearest strict ancestor that is a host widget.
    pub(crate) fn host_ancestor(&self, path: &InstancePath) -> Option<(InstancePath, WidgetId)> {
        path.ancestors().find_map(|ancestor| {
            let widget = self.entries.get(&ancestor)?.widget()?;
            Some((ancestor, widget))
        })
    }

    /// Paths of the subtree rooted at `path`, children before parents.
    pub fn subtree_post_order(&self, path: &InstancePath) -> Vec<InstancePath> {
        let mut out = Vec::new();
        self.collect_post_order(path, &mut out);
        out
    }

    fn collect_post_order(&self, path: &InstancePath, out: &mut Vec<InstancePath>) {
        if let Some(instance) = self.entries.get(path) {
            for child in &instance.children {
                self.collect_post_order(child, out);
            }
            out.push(path.clone());
        }
    }
}
