use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::collections::map::HashMap;
use crate::element::Widget;
use crate::error::ApplyError;

/// Handle of a concrete widget owned by the host. Allocated by the reconciler
/// before the widget exists so commands can refer to it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(u64);

impl WidgetId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

impl fmt::Debug for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Concrete widget handle living in the host.
pub trait Node: AsAny {
    fn insert_child(&mut self, _index: usize, _child: WidgetId) {}
    fn remove_child(&mut self, _child: WidgetId) {}
    fn children(&self) -> Vec<WidgetId> {
        Vec::new()
    }
    fn debug_label(&self) -> String {
        std::any::type_name::<Self>().to_owned()
    }
}

pub fn downcast_node_mut<N: Node + 'static>(
    node: &mut dyn Node,
    id: WidgetId,
) -> Result<&mut N, ApplyError> {
    node.as_any_mut()
        .downcast_mut::<N>()
        .ok_or(ApplyError::TypeMismatch {
            id,
            expected: std::any::type_name::<N>(),
        })
}

/// Widget storage on the host side. Commands are the only callers.
pub trait Applier {
    fn create(&mut self, id: WidgetId, node: Box<dyn Node>) -> Result<(), ApplyError>;
    fn get_mut(&mut self, id: WidgetId) -> Result<&mut dyn Node, ApplyError>;
    fn remove(&mut self, id: WidgetId) -> Result<Box<dyn Node>, ApplyError>;
    fn set_root(&mut self, _id: WidgetId) -> Result<(), ApplyError> {
        Ok(())
    }
}

type Action = Box<dyn FnOnce(&mut dyn Applier) -> Result<(), ApplyError> + 'static>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Create { widget: &'static str },
    Insert { parent: WidgetId, index: usize },
    /// Soft delete: the child stays alive and is reinserted later in the list.
    Detach { parent: WidgetId },
    Destroy { parent: Option<WidgetId> },
    SetRoot,
    Update { label: &'static str },
}

/// One deferred widget mutation.
pub struct Command {
    target: Option<WidgetId>,
    kind: CommandKind,
    action: Action,
}

impl Command {
    pub fn new(
        target: Option<WidgetId>,
        kind: CommandKind,
        action: impl FnOnce(&mut dyn Applier) -> Result<(), ApplyError> + 'static,
    ) -> Self {
        Self {
            target,
            kind,
            action: Box::new(action),
        }
    }

    /// Typed update of one widget, for use in [`Widget::update`].
    pub fn update<N: Node + 'static>(
        id: WidgetId,
        label: &'static str,
        f: impl FnOnce(&mut N) + 'static,
    ) -> Self {
        Self::new(
            Some(id),
            CommandKind::Update { label },
            move |applier: &mut dyn Applier| {
                let node = applier.get_mut(id)?;
                f(downcast_node_mut::<N>(node, id)?);
                Ok(())
            },
        )
    }

    pub(crate) fn create(id: WidgetId, widget: Rc<dyn Widget>) -> Self {
        Self::new(
            Some(id),
            CommandKind::Create {
                widget: widget.name(),
            },
            move |applier: &mut dyn Applier| applier.create(id, widget.create()),
        )
    }

    pub(crate) fn insert(parent: WidgetId, index: usize, child: WidgetId) -> Self {
        Self::new(
            Some(child),
            CommandKind::Insert { parent, index },
            move |applier: &mut dyn Applier| {
                applier.get_mut(parent)?.insert_child(index, child);
                Ok(())
            },
        )
    }

    pub(crate) fn detach(parent: WidgetId, child: WidgetId) -> Self {
        Self::new(
            Some(child),
            CommandKind::Detach { parent },
            move |applier: &mut dyn Applier| {
                applier.get_mut(parent)?.remove_child(child);
                Ok(())
            },
        )
    }

    pub(crate) fn destroy(id: WidgetId, parent: Option<WidgetId>, widget: Rc<dyn Widget>) -> Self {
        Self::new(
            Some(id),
            CommandKind::Destroy { parent },
            move |applier: &mut dyn Applier| {
                if let Some(parent) = parent {
                    applier.get_mut(parent)?.remove_child(id);
                }
                let mut node = applier.remove(id)?;
                widget.destroy(&mut *node);
                Ok(())
            },
        )
    }

    pub(crate) fn set_root(id: WidgetId) -> Self {
        Self::new(
            Some(id),
            CommandKind::SetRoot,
            move |applier: &mut dyn Applier| applier.set_root(id),
        )
    }

    pub fn target(&self) -> Option<WidgetId> {
        self.target
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub fn apply(self, applier: &mut dyn Applier) -> Result<(), ApplyError> {
        (self.action)(applier)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("target", &self.target)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Ordered output of one render pass.
#[derive(Debug, Default)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn kinds(&self) -> Vec<(Option<WidgetId>, CommandKind)> {
        self.commands
            .iter()
            .map(|command| (command.target, command.kind.clone()))
            .collect()
    }

    /// Apply every command in emission order, stopping at the first failure.
    pub fn apply(self, applier: &mut dyn Applier) -> Result<(), ApplyError> {
        for command in self.commands {
            command.apply(applier)?;
        }
        Ok(())
    }
}

impl Extend<Command> for CommandList {
    fn extend<I: IntoIterator<Item = Command>>(&mut self, iter: I) {
        self.commands.extend(iter);
    }
}

impl IntoIterator for CommandList {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

/// In-memory host used by tests and headless runs.
#[derive(Default)]
pub struct MemoryApplier {
    nodes: HashMap<WidgetId, Box<dyn Node>>,
    root: Option<WidgetId>,
}

impl MemoryApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node<N: Node + 'static>(&self, id: WidgetId) -> Option<&N> {
        self.nodes
            .get(&id)
            .and_then(|node| (**node).as_any().downcast_ref::<N>())
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn children(&self, id: WidgetId) -> Vec<WidgetId> {
        self.nodes
            .get(&id)
            .map(|node| node.children())
            .unwrap_or_default()
    }

    pub fn root(&self) -> Option<WidgetId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dump_tree(&self) -> String {
        let mut output = String::new();
        match self.root {
            Some(root) => self.dump_node(&mut output, root, 0),
            None => output.push_str("(no root)\n"),
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: WidgetId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.nodes.get(&id) {
            Some(node) => {
                output.push_str(&format!("{indent}[{id}] {}\n", node.debug_label()));
                for child in node.children() {
                    self.dump_node(output, child, depth + 1);
                }
            }
            None => output.push_str(&format!("{indent}[{id}] (missing)\n")),
        }
    }
}

impl Applier for MemoryApplier {
    fn create(&mut self, id: WidgetId, node: Box<dyn Node>) -> Result<(), ApplyError> {
        if self.nodes.contains_key(&id) {
            return Err(ApplyError::Occupied { id });
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    fn get_mut(&mut self, id: WidgetId) -> Result<&mut dyn Node, ApplyError> {
        let node = self.nodes.get_mut(&id).ok_or(ApplyError::Missing { id })?;
        Ok(node.as_mut())
    }

    fn remove(&mut self, id: WidgetId) -> Result<Box<dyn Node>, ApplyError> {
        if self.root == Some(id) {
            self.root = None;
        }
        self.nodes.remove(&id).ok_or(ApplyError::Missing { id })
    }

    fn set_root(&mut self, id: WidgetId) -> Result<(), ApplyError> {
        if !self.nodes.contains_key(&id) {
            return Err(ApplyError::Missing { id });
        }
        self.root = Some(id);
        Ok(())
    }
}
