//! Diffing of element trees against the instance store.
//!
//! A [`Reconciler`] lives for one render pass. It mutates the store only
//! through the pass [`Transaction`] and collects, in emission order, the
//! commands the host has to apply afterwards.

use std::rc::Rc;

use crate::collections::map::HashSet;
use crate::command::{Command, CommandList, WidgetId};
use crate::context::{PendingEffect, RenderContext};
use crate::element::{Component, Element, TypeKind};
use crate::error::RenderError;
use crate::journal::Transaction;
use crate::key::assign_keys;
use crate::path::{InstanceKey, InstancePath};
use crate::props::PropsDiff;
use crate::queue::RequestQueue;
use crate::scheduler::SchedulerConfig;
use crate::siblings;
use crate::store::{EffectCell, Instance, MountToken};

/// Everything a committed pass hands back to the scheduler.
pub(crate) struct Output {
    pub(crate) commands: CommandList,
    pub(crate) effects: Vec<PendingEffect>,
    pub(crate) unmounted: Vec<(MountToken, Vec<EffectCell>)>,
}

pub(crate) struct Reconciler<'a> {
    tx: &'a mut Transaction,
    config: &'a SchedulerConfig,
    queue: &'a RequestQueue,
    next_widget: &'a mut u64,
    commands: CommandList,
    effects: Vec<PendingEffect>,
    unmounted: Vec<(MountToken, Vec<EffectCell>)>,
    destroyed: HashSet<WidgetId>,
}

impl<'a> Reconciler<'a> {
    pub(crate) fn new(
        tx: &'a mut Transaction,
        config: &'a SchedulerConfig,
        queue: &'a RequestQueue,
        next_widget: &'a mut u64,
    ) -> Self {
        Self {
            tx,
            config,
            queue,
            next_widget,
            commands: CommandList::new(),
            effects: Vec::new(),
            unmounted: Vec::new(),
            destroyed: HashSet::default(),
        }
    }

    pub(crate) fn store(&self) -> &crate::store::InstanceStore {
        self.tx.store()
    }

    pub(crate) fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub(crate) fn finish(self) -> Output {
        Output {
            commands: self.commands,
            effects: self.effects,
            unmounted: self.unmounted,
        }
    }

    /// Brings the instance at `path` in line with `element`, mounting,
    /// updating or recreating it.
    pub(crate) fn reconcile(
        &mut self,
        path: &InstancePath,
        element: &Element,
        parent: Option<WidgetId>,
    ) -> Result<(), RenderError> {
        let same_type = self
            .tx
            .store()
            .get(path)
            .map(|instance| instance.element().element_type() == element.element_type());
        match same_type {
            Some(true) => self.update(path, element, parent),
            Some(false) => {
                self.destroy(path, parent);
                self.mount(path, element, parent)
            }
            None => self.mount(path, element, parent),
        }
    }

    /// Re-renders a live subtree with the element it was last rendered with,
    /// then repositions its host widget if a component root was recreated.
    pub(crate) fn reconcile_subtree(&mut self, start: &InstancePath) -> Result<(), RenderError> {
        let Some(instance) = self.tx.store().get(start) else {
            return Ok(());
        };
        let element = instance.element().clone();
        let host = self.tx.store().host_ancestor(start);
        let before = host
            .as_ref()
            .map(|(host_path, _)| self.tx.store().host_children(host_path));

        self.update(start, &element, host.as_ref().map(|(_, widget)| *widget))?;

        if let (Some((host_path, widget)), Some(before)) = (host, before) {
            let after = self.tx.store().host_children(&host_path);
            if before != after {
                let moves = siblings::diff(widget, &before, &after, &self.destroyed)?;
                self.commands.extend(moves);
            }
        }
        Ok(())
    }

    fn mount(
        &mut self,
        path: &InstancePath,
        element: &Element,
        parent: Option<WidgetId>,
    ) -> Result<(), RenderError> {
        let generation = self.tx.next_generation();
        match element.element_type().kind() {
            TypeKind::Widget(widget) => {
                let widget = Rc::clone(widget);
                let id = self.allocate();
                self.tx
                    .mount(Instance::host(path.clone(), element.clone(), id, generation));
                self.commands.push(Command::create(id, Rc::clone(&widget)));
                self.commands
                    .extend(widget.update(id, &PropsDiff::mount(element.props())));
                self.reconcile_children(path, element, id)
            }
            TypeKind::Component(component) => {
                let component = Rc::clone(component);
                self.tx
                    .mount(Instance::component(path.clone(), element.clone(), generation));
                self.render_component(path, element, &component, parent, true)
            }
        }
    }

    fn update(
        &mut self,
        path: &InstancePath,
        element: &Element,
        parent: Option<WidgetId>,
    ) -> Result<(), RenderError> {
        let Some(previous) = self.tx.replace_element(path, element.clone()) else {
            return self.mount(path, element, parent);
        };
        match element.element_type().kind() {
            TypeKind::Widget(widget) => {
                let Some(id) = self.tx.store().get(path).and_then(|instance| instance.widget())
                else {
                    return Ok(());
                };
                let diff = PropsDiff::between(previous.props(), element.props());
                self.commands.extend(widget.update(id, &diff));
                self.reconcile_children(path, element, id)
            }
            TypeKind::Component(component) => {
                let component = Rc::clone(component);
                self.render_component(path, element, &component, parent, false)
            }
        }
    }

    fn render_component(
        &mut self,
        path: &InstancePath,
        element: &Element,
        component: &Rc<dyn Component>,
        parent: Option<WidgetId>,
        first_render: bool,
    ) -> Result<(), RenderError> {
        let rendered = {
            let mut cx = RenderContext::new(
                &mut *self.tx,
                path,
                element,
                self.queue,
                &mut self.effects,
                first_render,
            );
            let rendered = component
                .render(element.props(), &mut cx)
                .map_err(|source| RenderError::from_component(path, component.name(), source))?;
            cx.finish()?;
            rendered
        };

        let key = match rendered.key() {
            Some(key) => InstanceKey::Explicit(key.to_owned()),
            None => InstanceKey::Positional(0),
        };
        let child = path.child(key);
        let previous = self
            .tx
            .store()
            .get(path)
            .map(|instance| instance.children().to_vec())
            .unwrap_or_default();
        for stale in previous.iter().filter(|stale| **stale != child) {
            self.destroy(stale, parent);
        }
        self.reconcile(&child, &rendered, parent)?;
        if previous.as_slice() != std::slice::from_ref(&child) {
            self.tx.replace_children(path, vec![child]);
        }
        Ok(())
    }

    fn reconcile_children(
        &mut self,
        path: &InstancePath,
        element: &Element,
        host: WidgetId,
    ) -> Result<(), RenderError> {
        let children = element.children();
        let keys = assign_keys(path, children, self.config.positional_key_warnings)?;
        let paths: Vec<InstancePath> = keys.into_iter().map(|key| path.child(key)).collect();

        let previous = self
            .tx
            .store()
            .get(path)
            .map(|instance| instance.children().to_vec())
            .unwrap_or_default();
        let old_widgets = self.tx.store().host_children(path);

        // Destroys of this list go out before anything in it is inserted.
        for stale in &previous {
            let kept = paths.iter().zip(children).any(|(path, child)| {
                path == stale
                    && self
                        .tx
                        .store()
                        .get(stale)
                        .is_some_and(|instance| instance.element().element_type() == child.element_type())
            });
            if !kept {
                self.destroy(stale, Some(host));
            }
        }

        for (child_path, child) in paths.iter().zip(children) {
            self.reconcile(child_path, child, Some(host))?;
        }

        let new_widgets: Vec<WidgetId> = paths
            .iter()
            .filter_map(|child_path| self.tx.store().host_widget(child_path))
            .collect();
        let moves = siblings::diff(host, &old_widgets, &new_widgets, &self.destroyed)?;
        self.commands.extend(moves);

        if previous != paths {
            self.tx.replace_children(path, paths);
        }
        Ok(())
    }

    /// Unmounts the subtree at `path`, emitting destroys children first.
    ///
    /// `parent` is the host widget the subtree hangs off; widgets inside the
    /// subtree are detached from their nearest host ancestor within it.
    fn destroy(&mut self, path: &InstancePath, parent: Option<WidgetId>) {
        for doomed in self.tx.store().subtree_post_order(path) {
            let host = self.tx.store().get(&doomed).and_then(|instance| {
                match (instance.widget(), instance.element().element_type().kind()) {
                    (Some(id), TypeKind::Widget(widget)) => Some((id, Rc::clone(widget))),
                    _ => None,
                }
            });
            if let Some((id, widget)) = host {
                let host_parent = doomed
                    .ancestors()
                    .take_while(|ancestor| path.contains(ancestor))
                    .find_map(|ancestor| self.tx.store().get(&ancestor)?.widget())
                    .or(parent);
                self.commands.push(Command::destroy(id, host_parent, widget));
                self.destroyed.insert(id);
            }
            if let Some(instance) = self.tx.unmount(&doomed) {
                let cells = instance.effect_cells();
                self.unmounted.push((instance.token().clone(), cells));
            }
        }
    }

    fn allocate(&mut self) -> WidgetId {
        *self.next_widget += 1;
        WidgetId::from_raw(*self.next_widget)
    }
}
