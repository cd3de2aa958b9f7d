use std::thread;
use std::time::{Duration, Instant};

use arbor_core::{
    Command, ComponentResult, Element, InstancePath, MemoryApplier, Node, PropValue, Props,
    PropsDiff, RenderContext, Root, SchedulerConfig, Widget, WidgetId,
};
use arbor_macros::component;
use arbor_runtime_std::{spawn_background, StdRuntime};

const TICK_INTERVAL: Duration = Duration::from_millis(150);
const DEADLINE: Duration = Duration::from_secs(5);

#[derive(Default)]
struct TextNode {
    text: String,
}

impl Node for TextNode {
    fn debug_label(&self) -> String {
        format!("Text({:?})", self.text)
    }
}

struct Text;

impl Widget for Text {
    fn name(&self) -> &'static str {
        "Text"
    }

    fn create(&self) -> Box<dyn Node> {
        Box::new(TextNode::default())
    }

    fn update(&self, id: WidgetId, diff: &PropsDiff) -> Vec<Command> {
        match diff.new_value("text").and_then(PropValue::as_str) {
            Some(text) => {
                let text = text.to_owned();
                vec![Command::update::<TextNode>(id, "set_text", move |node| {
                    node.text = text;
                })]
            }
            None => Vec::new(),
        }
    }
}

#[derive(Default)]
struct ColumnNode {
    children: Vec<WidgetId>,
}

impl Node for ColumnNode {
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
        "Column".to_owned()
    }
}

struct Column;

impl Widget for Column {
    fn name(&self) -> &'static str {
        "Column"
    }

    fn create(&self) -> Box<dyn Node> {
        Box::new(ColumnNode::default())
    }

    fn update(&self, _id: WidgetId, _diff: &PropsDiff) -> Vec<Command> {
        Vec::new()
    }
}

fn text(key: &str, value: String) -> Element {
    Element::widget(Text).key(key).prop("text", value).build()
}

#[component]
fn counter(props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult {
    let target = props.get("target").and_then(PropValue::as_int).unwrap_or(3);
    if cx.is_first_render() {
        log::info!("counter mounted at {} counting to {target}", cx.path());
    }
    let count = cx
        .use_state("count", || PropValue::Int(0))?
        .as_int()
        .unwrap_or_default();

    let handle = cx.handle();
    cx.use_effect(Some(vec![count.into()]), move || {
        if count < target {
            let next = count + 1;
            let spawned = spawn_background(handle, move || {
                thread::sleep(TICK_INTERVAL);
                vec![("count".to_owned(), next.into())]
            });
            if let Err(err) = spawned {
                log::error!("failed to start ticker: {err}");
            }
        }
        None
    })?;

    let mut rows = vec![text("count", format!("count: {count}"))];
    if count >= target {
        rows.insert(0, text("done", "done!".to_owned()));
    }
    Ok(Element::widget(Column).children(rows).build())
}

fn main() {
    env_logger::init();

    println!("=== Arbor counter demo ===");
    println!("A background worker bumps the counter until it reaches its target.");
    println!("Set RUST_LOG=debug to watch render passes, ARBOR_TRACE_COMMANDS=1 for commands.");
    println!();

    let runtime = StdRuntime::new();
    let scheduler = runtime.create_scheduler(SchedulerConfig::from_env());
    let mut root = Root::with_scheduler(scheduler, MemoryApplier::new());
    let target = 5;
    if let Err(err) = root.render(Counter::element().prop("target", target)) {
        log::error!("initial render failed: {err}");
        return;
    }
    print!("{}", root.applier().dump_tree());
    // The initial render already settled; drop the tick it requested.
    runtime.take_tick_request();

    let started = Instant::now();
    while let Some(remaining) = DEADLINE.checked_sub(started.elapsed()) {
        if !runtime.wait_for_tick(remaining) {
            break;
        }
        root.update();
        println!("---");
        print!("{}", root.applier().dump_tree());
        let count = root
            .scheduler()
            .store()
            .get(&InstancePath::root())
            .and_then(|instance| instance.state("count"))
            .and_then(PropValue::as_int);
        if count == Some(i64::from(target)) {
            println!("reached {target} in {:?}", started.elapsed());
            return;
        }
    }
    log::warn!("counter did not reach {target} before the deadline");
}
