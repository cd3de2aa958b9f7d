//! Render-request queue draining and pass orchestration.

use std::fmt;
use std::sync::Arc;

use async_channel::Receiver;
use indexmap::IndexSet;

use crate::command::{Applier, Command, CommandKind, CommandList, WidgetId};
use crate::context::PendingEffect;
use crate::element::Element;
use crate::error::{ApplyError, PassError, RenderError};
use crate::journal::{Journal, Transaction};
use crate::path::InstancePath;
use crate::platform::{ManualTick, TickScheduler};
use crate::queue::{Message, RequestQueue, StateFields, StateHandle};
use crate::reconciler::{Output, Reconciler};
use crate::store::{EffectCell, InstanceStore};

/// Tunables of a [`Scheduler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Log when unkeyed siblings fall back to positional keys.
    pub positional_key_warnings: bool,
    /// Log every emitted command at trace level.
    pub trace_commands: bool,
    /// Upper bound on queue messages folded into one pass.
    pub max_messages_per_tick: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            positional_key_warnings: true,
            trace_commands: false,
            max_messages_per_tick: 1024,
        }
    }
}

impl SchedulerConfig {
    /// Defaults, with `ARBOR_TRACE_COMMANDS` turning on command tracing and
    /// `ARBOR_QUIET_KEYS` silencing positional key warnings when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if std::env::var("ARBOR_TRACE_COMMANDS").is_ok() {
            config.trace_commands = true;
        }
        if std::env::var("ARBOR_QUIET_KEYS").is_ok() {
            config.positional_key_warnings = false;
        }
        config
    }
}

/// Output of one committed render pass.
///
/// Nothing has touched the host yet; [`apply`](Self::apply) runs the commands
/// and then the lifecycle callbacks the pass scheduled.
pub struct Pass {
    start: InstancePath,
    commands: CommandList,
    cleanups: Vec<EffectCell>,
    effects: Vec<PendingEffect>,
}

impl Pass {
    /// Path the pass started from.
    pub fn start(&self) -> &InstancePath {
        &self.start
    }

    pub fn commands(&self) -> &CommandList {
        &self.commands
    }

    pub fn kinds(&self) -> Vec<(Option<WidgetId>, CommandKind)> {
        self.commands.kinds()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.cleanups.is_empty() && self.effects.is_empty()
    }

    /// Applies the commands in order, then runs unmount cleanups and the
    /// effects scheduled by this pass. Callbacks are skipped when a command
    /// fails.
    pub fn apply(self, applier: &mut dyn Applier) -> Result<(), ApplyError> {
        self.commands.apply(applier)?;
        for cell in self.cleanups {
            let cleanup = cell.borrow_mut().take();
            if let Some(cleanup) = cleanup {
                cleanup();
            }
        }
        for effect in self.effects {
            effect.run();
        }
        Ok(())
    }
}

impl fmt::Debug for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass")
            .field("start", &self.start)
            .field("commands", &self.commands)
            .field("cleanups", &self.cleanups.len())
            .field("effects", &self.effects.len())
            .finish()
    }
}

/// Owns the instance store and runs render passes on the owning thread.
pub struct Scheduler {
    config: SchedulerConfig,
    store: InstanceStore,
    root: Option<Element>,
    pending_root: Option<Element>,
    pending: IndexSet<InstancePath>,
    next_widget: u64,
    queue: RequestQueue,
    receiver: Receiver<Message>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_tick_scheduler(Arc::new(ManualTick), SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self::with_tick_scheduler(Arc::new(ManualTick), config)
    }

    pub fn with_tick_scheduler(waker: Arc<dyn TickScheduler>, config: SchedulerConfig) -> Self {
        let (queue, receiver) = RequestQueue::new(waker);
        Self {
            config,
            store: InstanceStore::new(),
            root: None,
            pending_root: None,
            pending: IndexSet::new(),
            next_widget: 0,
            queue,
            receiver,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Sender side, for other threads.
    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    /// Last committed root description.
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    pub fn root_widget(&self) -> Option<WidgetId> {
        self.store.host_widget(&InstancePath::root())
    }

    /// Replaces the root description; the next tick renders from the root.
    pub fn set_root(&mut self, element: impl Into<Element>) {
        self.pending_root = Some(element.into());
        self.queue.wake();
    }

    pub fn has_pending(&self) -> bool {
        self.pending_root.is_some() || !self.pending.is_empty() || !self.receiver.is_empty()
    }

    /// Handle for the component mounted at `path`.
    pub fn state_handle(&self, path: &InstancePath) -> Option<StateHandle> {
        let instance = self.store.get(path)?;
        Some(StateHandle::new(
            path.clone(),
            instance.generation(),
            instance.token().clone(),
            self.queue.clone(),
        ))
    }

    /// Runs at most one render pass over everything queued so far.
    ///
    /// Returns `Ok(None)` when there was nothing to render. On error the
    /// store is left exactly as before the tick and the queued requests are
    /// dropped.
    pub fn tick(&mut self) -> Result<Option<Pass>, RenderError> {
        let messages = self.drain();
        let pending_root = self.pending_root.take();
        let mut requested = std::mem::take(&mut self.pending);
        if messages.is_empty() && pending_root.is_none() && requested.is_empty() {
            return Ok(None);
        }
        let from_root = pending_root.is_some();
        let Some(root) = pending_root.clone().or_else(|| self.root.clone()) else {
            log::debug!("dropping {} queued messages: nothing mounted", messages.len());
            return Ok(None);
        };

        let Self {
            config,
            store,
            next_widget,
            queue,
            ..
        } = self;
        let outcome = Journal::scope(
            store,
            |tx: &mut Transaction| -> Result<Option<(InstancePath, Output)>, RenderError> {
                for message in messages {
                    match message {
                        Message::Render { path } => {
                            requested.insert(path);
                        }
                        Message::SetState {
                            path,
                            generation,
                            fields,
                        } => {
                            if write_state(tx, &path, generation, fields) {
                                requested.insert(path);
                            }
                        }
                    }
                }

                let start = if from_root {
                    Some(InstancePath::root())
                } else {
                    let live = requested.iter().filter(|path| tx.store().contains(path));
                    InstancePath::common_ancestor_of(live)
                };
                let Some(start) = start else {
                    return Ok(None);
                };

                let root_path = InstancePath::root();
                let root_before = tx.store().host_widget(&root_path);
                let mut reconciler = Reconciler::new(tx, config, queue, next_widget);
                if start.is_root() {
                    reconciler.reconcile(&root_path, &root, None)?;
                } else {
                    reconciler.reconcile_subtree(&start)?;
                }
                let root_after = reconciler.store().host_widget(&root_path);
                if let Some(widget) = root_after.filter(|widget| root_before != Some(*widget)) {
                    reconciler.push(Command::set_root(widget));
                }
                let output = reconciler.finish();
                log::trace!("pass from {start} journaled {} store changes", tx.journal().len());
                Ok(Some((start, output)))
            },
        );

        let (output, net) = outcome?;
        if from_root {
            self.root = pending_root;
        }
        let Some((start, output)) = output else {
            return Ok(None);
        };

        if let Some(target) = InstancePath::common_ancestor_of(net.iter().map(|change| &change.target)) {
            log::debug!("{} state fields changed during render; scheduling {target}", net.len());
            self.pending.insert(target);
            self.queue.wake();
        }

        let unmounted = output.unmounted.len();
        let mut cleanups = Vec::new();
        for (token, cells) in output.unmounted {
            token.unmount();
            cleanups.extend(cells);
        }

        log::debug!(
            "pass from {start}: {} commands, {} instances unmounted, {} effects",
            output.commands.len(),
            unmounted,
            output.effects.len()
        );
        if self.config.trace_commands {
            for command in output.commands.iter() {
                log::trace!("{:?} {:?}", command.target(), command.kind());
            }
        }

        Ok(Some(Pass {
            start,
            commands: output.commands,
            cleanups,
            effects: output.effects,
        }))
    }

    fn drain(&self) -> Vec<Message> {
        let mut messages = Vec::new();
        while messages.len() < self.config.max_messages_per_tick {
            match self.receiver.try_recv() {
                Ok(message) => messages.push(message),
                Err(_) => break,
            }
        }
        if !self.receiver.is_empty() {
            // Leftovers get their own tick.
            self.queue.wake();
        }
        messages
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("instances", &self.store.len())
            .field("root", &self.root)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

/// Applies a queued state write. Returns whether any field changed.
fn write_state(
    tx: &mut Transaction,
    path: &InstancePath,
    generation: Option<u64>,
    fields: StateFields,
) -> bool {
    let Some(instance) = tx.store().get(path) else {
        log::debug!("dropping state update for {path}: not mounted");
        return false;
    };
    if generation.is_some_and(|generation| generation != instance.generation()) {
        log::debug!("dropping state update for {path}: instance was replaced");
        return false;
    }
    let mut changed = false;
    for (field, value) in fields {
        match tx.write_field(path, &field, value, false) {
            Ok(field_changed) => changed |= field_changed,
            Err(err) => {
                log::warn!("state update for {path} ignored: {err}");
                return changed;
            }
        }
    }
    changed
}

/// Passes allowed per [`Root::update`] before the rest is left for later.
const MAX_PASSES_PER_UPDATE: usize = 64;

/// A scheduler bundled with the host it applies to.
pub struct Root<A: Applier> {
    scheduler: Scheduler,
    applier: A,
}

impl<A: Applier> Root<A> {
    pub fn new(applier: A) -> Self {
        Self::with_scheduler(Scheduler::new(), applier)
    }

    pub fn with_scheduler(scheduler: Scheduler, applier: A) -> Self {
        Self { scheduler, applier }
    }

    /// Renders `element` as the new root and settles follow-up passes.
    pub fn render(&mut self, element: impl Into<Element>) -> Result<(), PassError> {
        self.scheduler.set_root(element);
        self.process_pending()
    }

    pub fn should_render(&self) -> bool {
        self.scheduler.has_pending()
    }

    /// Runs passes until the queue is idle.
    pub fn process_pending(&mut self) -> Result<(), PassError> {
        for _ in 0..MAX_PASSES_PER_UPDATE {
            match self.scheduler.tick()? {
                Some(pass) => pass.apply(&mut self.applier)?,
                None => return Ok(()),
            }
        }
        log::warn!("render passes did not settle after {MAX_PASSES_PER_UPDATE} iterations");
        Ok(())
    }

    /// Host loop entry point: processes pending work, logging failures.
    pub fn update(&mut self) {
        if !self.should_render() {
            return;
        }
        if let Err(err) = self.process_pending() {
            log::error!("render pass failed: {err}");
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn queue(&self) -> &RequestQueue {
        self.scheduler.queue()
    }

    pub fn applier(&self) -> &A {
        &self.applier
    }

    pub fn applier_mut(&mut self) -> &mut A {
        &mut self.applier
    }
}
