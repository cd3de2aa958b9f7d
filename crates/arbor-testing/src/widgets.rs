use arbor_core::{Command, Element, Node, PropValue, PropsDiff, Widget, WidgetId};

/// Text leaf. Reads the `text` prop.
#[derive(Clone, Copy, Debug, Default)]
pub struct Label;

#[derive(Debug, Default)]
pub struct LabelNode {
    pub text: String,
    /// Number of text writes applied to this node.
    pub writes: usize,
}

impl Node for LabelNode {
    fn debug_label(&self) -> String {
        format!("Label({:?})", self.text)
    }
}

impl Widget for Label {
    fn name(&self) -> &'static str {
        "Label"
    }

    fn create(&self) -> Box<dyn Node> {
        Box::new(LabelNode::default())
    }

    fn update(&self, id: WidgetId, diff: &PropsDiff) -> Vec<Command> {
        let Some(change) = diff.get("text") else {
            return Vec::new();
        };
        let text = change
            .new
            .as_ref()
            .and_then(PropValue::as_str)
            .unwrap_or_default()
            .to_owned();
        vec![Command::update::<LabelNode>(id, "set_text", move |node| {
            node.text = text;
            node.writes += 1;
        })]
    }
}

/// Container keeping its children in insertion order.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stack;

#[derive(Debug, Default)]
pub struct StackNode {
    pub children: Vec<WidgetId>,
}

impl Node for StackNode {
    fn insert_child(&mut self, index: usize, child: WidgetId) {
        let index = index.min(self.children.len());
        self.children.insert(index, child);
    }

    fn remove_child(&mut self, child: WidgetId) {
        self.children.retain(|existing| *existing != child);
    }

    fn children(&self) -> Vec<WidgetId> {
        self.children.clone()
    }

    fn debug_label(&self) -> String {
        "Stack".to_owned()
    }
}

impl Widget for Stack {
    fn name(&self) -> &'static str {
        "Stack"
    }

    fn create(&self) -> Box<dyn Node> {
        Box::new(StackNode::default())
    }

    fn update(&self, _id: WidgetId, _diff: &PropsDiff) -> Vec<Command> {
        Vec::new()
    }
}

/// Keyed label.
pub fn label(key: &str, text: &str) -> Element {
    Element::widget(Label).key(key).prop("text", text).build()
}

/// Unkeyed label.
pub fn text(text: &str) -> Element {
    Element::widget(Label).prop("text", text).build()
}

pub fn stack(children: impl IntoIterator<Item = Element>) -> Element {
    Element::widget(Stack).children(children).build()
}

pub fn keyed_stack(key: &str, children: impl IntoIterator<Item = Element>) -> Element {
    Element::widget(Stack).key(key).children(children).build()
}
