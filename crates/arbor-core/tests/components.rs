use std::cell::{Cell, RefCell};

use arbor_core::{
    Cleanup, CommandKind, ComponentResult, Element, InstanceKey, InstancePath, PassError,
    PropValue, Props, RenderContext, RenderError, StateError,
};
use arbor_macros::component;
use arbor_testing::{keyed_stack, label, path, stack, text, TestRoot};

thread_local! {
    static FAIL: Cell<bool> = Cell::new(false);
    static SHIFT: Cell<bool> = Cell::new(false);
    static RENAMED: Cell<bool> = Cell::new(false);
    static RENDERS: Cell<usize> = Cell::new(0);
    static COMPUTES: Cell<usize> = Cell::new(0);
    static EFFECT_LOG: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

fn log_effect(entry: String) {
    EFFECT_LOG.with(|log| log.borrow_mut().push(entry));
}

fn effect_log() -> Vec<String> {
    EFFECT_LOG.with(|log| log.borrow().clone())
}

fn rendered_child(keys: &[&str]) -> InstancePath {
    path(keys).child(InstanceKey::Positional(0))
}

fn state_of(root: &TestRoot, at: &InstancePath, field: &str) -> Option<PropValue> {
    root.store().get(at)?.state(field).cloned()
}

#[component]
fn counter(props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult {
    let count = cx.use_state("count", || PropValue::Int(0))?;
    let name = props.get("name").and_then(PropValue::as_str).unwrap_or("count");
    Ok(text(&format!("{name}: {}", count.as_int().unwrap_or_default())))
}

#[component]
fn other(_props: &Props, _cx: &mut RenderContext<'_>) -> ComponentResult {
    Ok(text("other"))
}

#[component]
fn fragile(_props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult {
    let x = cx.use_state("x", || PropValue::Int(1))?;
    if FAIL.with(Cell::get) {
        cx.set_state("x", 3)?;
        return Err("boom".into());
    }
    Ok(text(&format!("x = {}", x.as_int().unwrap_or_default())))
}

#[component]
fn shifty(_props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult {
    if SHIFT.with(Cell::get) {
        cx.use_memo(Vec::new(), || PropValue::Null)?;
    } else {
        cx.use_state("s", || PropValue::Int(0))?;
    }
    Ok(text("shifty"))
}

#[component]
fn renamer(_props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult {
    let field = if RENAMED.with(Cell::get) { "b" } else { "a" };
    cx.use_state(field, || PropValue::Int(0))?;
    Ok(text(field))
}

#[component]
fn settle(_props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult {
    RENDERS.with(|renders| renders.set(renders.get() + 1));
    let n = cx
        .use_state("n", || PropValue::Int(0))?
        .as_int()
        .unwrap_or_default();
    if n < 3 {
        cx.set_state("n", n + 1)?;
    }
    Ok(text(&format!("n = {n}")))
}

#[component]
fn doubler(props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult {
    let input = props.get("n").cloned().unwrap_or_default();
    let seed = input.as_int().unwrap_or_default();
    let doubled = cx.use_memo(vec![input], || {
        COMPUTES.with(|computes| computes.set(computes.get() + 1));
        PropValue::Int(seed * 2)
    })?;
    Ok(text(&doubled.as_int().unwrap_or_default().to_string()))
}

#[component]
fn tally(_props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult {
    let renders = cx.use_ref(|| 0usize)?;
    *renders.borrow_mut() += 1;
    let seen = *renders.borrow();
    Ok(text(&format!("rendered {seen} times")))
}

#[component]
fn lifecycle(props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult {
    let tag = props
        .get("tag")
        .and_then(PropValue::as_str)
        .unwrap_or_default()
        .to_owned();
    let effect_tag = tag.clone();
    cx.use_effect(Some(vec![tag.as_str().into()]), move || {
        log_effect(format!("run {effect_tag}"));
        let cleanup: Cleanup = Box::new(move || log_effect(format!("cleanup {effect_tag}")));
        Some(cleanup)
    })?;
    Ok(text(&tag))
}

#[component(Switch)]
fn switcher(_props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult {
    let boxed = cx.use_state("boxed", || PropValue::Bool(false))?;
    if boxed.as_bool().unwrap_or_default() {
        Ok(stack([]))
    } else {
        Ok(text("plain"))
    }
}

#[test]
fn component_renders_through_to_host_widget() {
    let mut root = TestRoot::new();
    root.render(Counter::element().prop("name", "clicks"))
        .expect("render succeeds");

    let leaf = rendered_child(&[]);
    assert_eq!(root.text_at(&leaf), Some("clicks: 0"));
    assert_eq!(root.root_widget(), root.widget_at(&leaf));
    assert_eq!(
        state_of(&root, &InstancePath::root(), "count"),
        Some(PropValue::Int(0))
    );
    assert!(root.store().get(&InstancePath::root()).expect("mounted").is_component());
}

#[test]
fn keyed_components_keep_state_across_reorder() {
    let mut root = TestRoot::new();
    let list = |keys: &[&str]| stack(keys.iter().map(|key| Counter::element().key(*key).build()));
    root.render(list(&["a", "b"])).expect("render succeeds");
    root.queue()
        .set_state(path(&["a"]), vec![("count".into(), 5.into())])
        .expect("queue open");
    let commands = root.tick().expect("tick succeeds").expect("pass ran");
    assert_eq!(commands.len(), 1);
    root.host_mut().clear_ops();

    let commands = root.render(list(&["b", "a"])).expect("render succeeds");

    assert!(commands.iter().all(|(_, kind)| !matches!(
        kind,
        CommandKind::Create { .. } | CommandKind::Destroy { .. }
    )));
    assert!(root.host().ops().is_empty());
    assert_eq!(state_of(&root, &path(&["a"]), "count"), Some(PropValue::Int(5)));
    let parent = root.root_widget().expect("root widget");
    assert_eq!(root.host().texts_under(parent), vec!["count: 0", "count: 5"]);
}

#[test]
fn type_change_starts_with_fresh_state() {
    let mut root = TestRoot::new();
    root.render(stack([Counter::element().key("k").build()]))
        .expect("render succeeds");
    root.queue()
        .set_state(path(&["k"]), vec![("count".into(), 3.into())])
        .expect("queue open");
    root.pump_until_idle().expect("passes succeed");
    let old_leaf = root.widget_at(&path(&["k"])).expect("leaf");
    let old_handle = root.handle(&path(&["k"])).expect("mounted");

    let commands = root
        .render(stack([Other::element().key("k").build()]))
        .expect("render succeeds");
    assert_eq!(commands.first().map(|(id, _)| *id), Some(Some(old_leaf)));
    assert!(matches!(commands[0].1, CommandKind::Destroy { .. }));
    assert!(!old_handle.is_mounted());

    root.render(stack([Counter::element().key("k").build()]))
        .expect("render succeeds");
    assert_eq!(state_of(&root, &path(&["k"]), "count"), Some(PropValue::Int(0)));
    assert_eq!(root.text_at(&path(&["k"])), Some("count: 0"));
    assert_eq!(
        old_handle.set("count", 9),
        Err(StateError::Unmounted { path: path(&["k"]) })
    );
}

#[test]
fn failed_render_rolls_back_state_and_applies_nothing() {
    FAIL.with(|fail| fail.set(false));
    let mut root = TestRoot::new();
    root.render(Fragile::element()).expect("render succeeds");
    root.host_mut().clear_ops();

    FAIL.with(|fail| fail.set(true));
    root.queue()
        .set_state(InstancePath::root(), vec![("other".into(), 7.into())])
        .expect("queue open");
    root.queue()
        .request_render(InstancePath::root())
        .expect("queue open");
    let err = root.tick().expect_err("render fails");

    match err {
        PassError::Render(RenderError::Component { path, name, source }) => {
            assert!(path.is_root());
            assert_eq!(name, "Fragile");
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(state_of(&root, &InstancePath::root(), "x"), Some(PropValue::Int(1)));
    assert_eq!(state_of(&root, &InstancePath::root(), "other"), None);
    assert!(root.host().ops().is_empty());
    assert_eq!(root.text_at(&rendered_child(&[])), Some("x = 1"));
    assert!(!root.scheduler().has_pending());
    FAIL.with(|fail| fail.set(false));
}

#[test]
fn failed_initial_render_leaves_nothing_behind() {
    FAIL.with(|fail| fail.set(true));
    let mut root = TestRoot::new();
    assert!(root.render(stack([Fragile::element().key("f").build()])).is_err());
    assert!(root.store().is_empty());
    assert!(root.host().is_empty());
    assert!(root.scheduler().root().is_none());
    FAIL.with(|fail| fail.set(false));
}

#[test]
fn reordered_hooks_are_reported() {
    SHIFT.with(|shift| shift.set(false));
    let mut root = TestRoot::new();
    root.render(Shifty::element()).expect("render succeeds");

    SHIFT.with(|shift| shift.set(true));
    root.queue()
        .request_render(InstancePath::root())
        .expect("queue open");
    let err = root.tick().expect_err("hook order changed");

    assert!(matches!(
        err,
        PassError::Render(RenderError::HookMismatch {
            index: 0,
            expected: "use_state",
            found: "use_memo",
            ..
        })
    ));
    SHIFT.with(|shift| shift.set(false));
}

#[test]
fn renamed_state_field_is_reported() {
    RENAMED.with(|renamed| renamed.set(false));
    let mut root = TestRoot::new();
    root.render(Renamer::element()).expect("render succeeds");
    root.host_mut().clear_ops();

    RENAMED.with(|renamed| renamed.set(true));
    root.queue()
        .request_render(InstancePath::root())
        .expect("queue open");
    let err = root.tick().expect_err("state field changed");

    match err {
        PassError::Render(RenderError::StateFieldMismatch {
            index,
            declared,
            found,
            ..
        }) => {
            assert_eq!(index, 0);
            assert_eq!(declared, "a");
            assert_eq!(found, "b");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(state_of(&root, &InstancePath::root(), "b"), None);
    assert!(root.host().ops().is_empty());
    assert_eq!(root.text_at(&rendered_child(&[])), Some("a"));
    RENAMED.with(|renamed| renamed.set(false));
}

#[test]
fn state_set_during_render_schedules_one_follow_up() {
    RENDERS.with(|renders| renders.set(0));
    let mut root = TestRoot::new();
    root.render(stack([Settle::element().key("s").build()]))
        .expect("render succeeds");
    assert_eq!(root.text_at(&path(&["s"])), Some("n = 0"));
    assert!(root.scheduler().has_pending());

    let passes = root.pump_until_idle().expect("passes succeed");

    assert_eq!(passes, 3);
    assert_eq!(RENDERS.with(Cell::get), 4);
    assert_eq!(root.text_at(&path(&["s"])), Some("n = 3"));
    assert!(!root.scheduler().has_pending());
}

#[test]
fn memo_recomputes_only_when_dependencies_change() {
    COMPUTES.with(|computes| computes.set(0));
    let mut root = TestRoot::new();
    root.render(Doubler::element().prop("n", 2))
        .expect("render succeeds");
    root.render(Doubler::element().prop("n", 2))
        .expect("render succeeds");
    assert_eq!(COMPUTES.with(Cell::get), 1);
    assert_eq!(root.text_at(&rendered_child(&[])), Some("4"));

    root.render(Doubler::element().prop("n", 3))
        .expect("render succeeds");
    assert_eq!(COMPUTES.with(Cell::get), 2);
    assert_eq!(root.text_at(&rendered_child(&[])), Some("6"));
}

#[test]
fn refs_persist_between_renders() {
    let mut root = TestRoot::new();
    root.render(Tally::element()).expect("render succeeds");
    root.render(Tally::element()).expect("render succeeds");
    root.render(Tally::element()).expect("render succeeds");
    assert_eq!(root.text_at(&rendered_child(&[])), Some("rendered 3 times"));
}

#[test]
fn effects_run_after_apply_and_clean_up_on_change_and_unmount() {
    EFFECT_LOG.with(|log| log.borrow_mut().clear());
    let mut root = TestRoot::new();
    let tagged = |tag: &str| stack([Lifecycle::element().key("l").prop("tag", tag).build()]);

    root.render(tagged("a")).expect("render succeeds");
    assert_eq!(effect_log(), vec!["run a"]);

    root.render(tagged("a")).expect("render succeeds");
    assert_eq!(effect_log(), vec!["run a"]);

    root.render(tagged("b")).expect("render succeeds");
    assert_eq!(effect_log(), vec!["run a", "cleanup a", "run b"]);

    root.render(stack(Vec::<Element>::new()))
        .expect("render succeeds");
    assert_eq!(
        effect_log(),
        vec!["run a", "cleanup a", "run b", "cleanup b"]
    );

    root.render(stack(Vec::<Element>::new()))
        .expect("render succeeds");
    assert_eq!(effect_log().len(), 4);
}

#[test]
fn recreated_component_root_keeps_its_position() {
    let mut root = TestRoot::new();
    root.render(stack([
        label("a", "A"),
        Switch::element().key("s").build(),
        label("b", "B"),
    ]))
    .expect("render succeeds");
    let parent = root.root_widget().expect("root widget");
    let a = root.widget_at(&path(&["a"])).expect("a");
    let b = root.widget_at(&path(&["b"])).expect("b");
    let old = root.widget_at(&path(&["s"])).expect("switch root");

    root.queue()
        .set_state(path(&["s"]), vec![("boxed".into(), true.into())])
        .expect("queue open");
    let commands = root.tick().expect("tick succeeds").expect("pass ran");

    let new = root.widget_at(&path(&["s"])).expect("switch root");
    assert_ne!(old, new);
    assert_eq!(
        commands,
        vec![
            (
                Some(old),
                CommandKind::Destroy {
                    parent: Some(parent)
                }
            ),
            (Some(new), CommandKind::Create { widget: "Stack" }),
            (Some(new), CommandKind::Insert { parent, index: 1 }),
        ]
    );
    assert_eq!(root.host().children_of(parent), vec![a, new, b]);
}

#[test]
fn component_keys_its_rendered_root() {
    let mut root = TestRoot::new();
    root.render(keyed_stack("outer", [Counter::element().key("c").build()]))
        .expect("render succeeds");
    let leaf = rendered_child(&["c"]);
    assert!(root.store().contains(&leaf));
    assert_eq!(root.widget_at(&path(&["c"])), root.widget_at(&leaf));
}
