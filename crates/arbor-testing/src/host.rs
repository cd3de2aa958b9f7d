use arbor_core::{Applier, ApplyError, MemoryApplier, Node, WidgetId};

use crate::widgets::LabelNode;

/// Lifecycle operation observed by a [`TestHost`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostOp {
    Create(WidgetId),
    Remove(WidgetId),
    SetRoot(WidgetId),
}

/// In-memory host that records every create, removal and root change.
#[derive(Default)]
pub struct TestHost {
    nodes: MemoryApplier,
    ops: Vec<HostOp>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn created(&self) -> usize {
        self.count(|op| matches!(op, HostOp::Create(_)))
    }

    pub fn removed(&self) -> usize {
        self.count(|op| matches!(op, HostOp::Remove(_)))
    }

    fn count(&self, filter: impl Fn(&HostOp) -> bool) -> usize {
        self.ops.iter().filter(|op| filter(op)).count()
    }

    pub fn root(&self) -> Option<WidgetId> {
        self.nodes.root()
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.nodes.contains(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children_of(&self, id: WidgetId) -> Vec<WidgetId> {
        self.nodes.children(id)
    }

    pub fn label(&self, id: WidgetId) -> Option<&LabelNode> {
        self.nodes.node::<LabelNode>(id)
    }

    pub fn text_of(&self, id: WidgetId) -> Option<&str> {
        self.label(id).map(|node| node.text.as_str())
    }

    /// Texts of the label children of `id`, in host order.
    pub fn texts_under(&self, id: WidgetId) -> Vec<String> {
        self.children_of(id)
            .into_iter()
            .filter_map(|child| self.text_of(child).map(str::to_owned))
            .collect()
    }

    pub fn dump(&self) -> String {
        self.nodes.dump_tree()
    }
}

impl Applier for TestHost {
    fn create(&mut self, id: WidgetId, node: Box<dyn Node>) -> Result<(), ApplyError> {
        self.nodes.create(id, node)?;
        self.ops.push(HostOp::Create(id));
        Ok(())
    }

    fn get_mut(&mut self, id: WidgetId) -> Result<&mut dyn Node, ApplyError> {
        self.nodes.get_mut(id)
    }

    fn remove(&mut self, id: WidgetId) -> Result<Box<dyn Node>, ApplyError> {
        let node = self.nodes.remove(id)?;
        self.ops.push(HostOp::Remove(id));
        Ok(node)
    }

    fn set_root(&mut self, id: WidgetId) -> Result<(), ApplyError> {
        self.nodes.set_root(id)?;
        self.ops.push(HostOp::SetRoot(id));
        Ok(())
    }
}
