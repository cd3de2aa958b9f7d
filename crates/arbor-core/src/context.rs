//! Per-render view of one component instance.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::element::Element;
use crate::error::RenderError;
use crate::journal::Transaction;
use crate::path::InstancePath;
use crate::props::{PropValue, Props};
use crate::queue::{RequestQueue, StateHandle};
use crate::store::{Cleanup, EffectCell, HookSlot};

type EffectFn = Box<dyn FnOnce() -> Option<Cleanup>>;

/// Effect scheduled by a render, run once the pass's commands are applied.
pub(crate) struct PendingEffect {
    cell: EffectCell,
    effect: EffectFn,
}

impl PendingEffect {
    pub(crate) fn run(self) {
        let previous = self.cell.borrow_mut().take();
        if let Some(cleanup) = previous {
            cleanup();
        }
        let cleanup = (self.effect)();
        *self.cell.borrow_mut() = cleanup;
    }
}

/// Passed to [`Component::render`](crate::Component::render).
///
/// Hooks are positional: the n-th hook call of a render is matched with the
/// n-th call of the previous render, and a different sequence fails the pass
/// with [`RenderError::HookMismatch`].
pub struct RenderContext<'a> {
    tx: &'a mut Transaction,
    path: &'a InstancePath,
    element: &'a Element,
    queue: &'a RequestQueue,
    effects: &'a mut Vec<PendingEffect>,
    first_render: bool,
    cursor: usize,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(
        tx: &'a mut Transaction,
        path: &'a InstancePath,
        element: &'a Element,
        queue: &'a RequestQueue,
        effects: &'a mut Vec<PendingEffect>,
        first_render: bool,
    ) -> Self {
        Self {
            tx,
            path,
            element,
            queue,
            effects,
            first_render,
            cursor: 0,
        }
    }

    pub fn path(&self) -> &InstancePath {
        self.path
    }

    pub fn props(&self) -> &Props {
        self.element.props()
    }

    /// Children handed to this component by its parent.
    pub fn children(&self) -> &[Element] {
        self.element.children()
    }

    pub fn is_first_render(&self) -> bool {
        self.first_render
    }

    /// Current value of a state field, including writes made earlier in this
    /// render.
    pub fn state(&self, field: &str) -> Option<&PropValue> {
        self.tx.store().get(self.path)?.state(field)
    }

    /// Declares a state field, initializing it on first use. The initial
    /// write does not trigger a re-render.
    pub fn use_state(
        &mut self,
        field: &str,
        init: impl FnOnce() -> PropValue,
    ) -> Result<PropValue, RenderError> {
        let (index, slot) = self.next_slot("use_state")?;
        match slot {
            Some(HookSlot::State { field: declared }) if declared != field => {
                return Err(RenderError::StateFieldMismatch {
                    path: self.path.clone(),
                    index,
                    declared,
                    found: field.to_owned(),
                });
            }
            Some(_) => {}
            None => self.tx.set_hook(
                self.path,
                index,
                HookSlot::State {
                    field: field.to_owned(),
                },
            ),
        }
        if let Some(value) = self.state(field) {
            return Ok(value.clone());
        }
        let value = init();
        self.tx
            .write_field(self.path, field, value.clone(), false)?;
        Ok(value)
    }

    /// Writes a state field. A net change schedules one more render of this
    /// instance after the current pass commits.
    pub fn set_state(&mut self, field: &str, value: impl Into<PropValue>) -> Result<bool, RenderError> {
        Ok(self.tx.set_field(self.path, field, value.into())?)
    }

    /// Recomputes the value only when `deps` changed since the last render.
    pub fn use_memo(
        &mut self,
        deps: Vec<PropValue>,
        compute: impl FnOnce() -> PropValue,
    ) -> Result<PropValue, RenderError> {
        let (index, slot) = self.next_slot("use_memo")?;
        if let Some(HookSlot::Memo {
            deps: previous,
            value,
        }) = slot
        {
            if previous == deps {
                return Ok(value);
            }
        }
        let value = compute();
        self.tx.set_hook(
            self.path,
            index,
            HookSlot::Memo {
                deps,
                value: value.clone(),
            },
        );
        Ok(value)
    }

    /// Mutable cell that survives re-renders. Writes to it are not journaled
    /// and survive a rolled back pass.
    pub fn use_ref<T: 'static>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> Result<Rc<RefCell<T>>, RenderError> {
        let (index, slot) = self.next_slot("use_ref")?;
        match slot {
            Some(HookSlot::Ref(cell)) => {
                cell.downcast::<RefCell<T>>()
                    .map_err(|_| RenderError::HookMismatch {
                        path: self.path.clone(),
                        index,
                        expected: "use_ref",
                        found: std::any::type_name::<T>(),
                    })
            }
            _ => {
                let cell = Rc::new(RefCell::new(init()));
                let stored: Rc<dyn Any> = cell.clone();
                self.tx.set_hook(self.path, index, HookSlot::Ref(stored));
                Ok(cell)
            }
        }
    }

    /// Schedules `effect` to run after the pass is applied, on mount and
    /// whenever `deps` changed. `None` deps run it after every render. The
    /// cleanup returned by the previous run is called first.
    pub fn use_effect(
        &mut self,
        deps: Option<Vec<PropValue>>,
        effect: impl FnOnce() -> Option<Cleanup> + 'static,
    ) -> Result<(), RenderError> {
        let (index, slot) = self.next_slot("use_effect")?;
        let (cell, due) = match slot {
            Some(HookSlot::Effect {
                deps: previous,
                cleanup,
            }) => {
                let due = match (&previous, &deps) {
                    (Some(previous), Some(deps)) => previous != deps,
                    _ => true,
                };
                (cleanup, due)
            }
            _ => (EffectCell::default(), true),
        };
        if !due {
            return Ok(());
        }
        self.tx.set_hook(
            self.path,
            index,
            HookSlot::Effect {
                deps,
                cleanup: Rc::clone(&cell),
            },
        );
        self.effects.push(PendingEffect {
            cell,
            effect: Box::new(effect),
        });
        Ok(())
    }

    /// `Send` handle for handing results of background work back to this
    /// instance.
    pub fn handle(&self) -> StateHandle {
        let (generation, token) = match self.tx.store().get(self.path) {
            Some(instance) => (instance.generation(), instance.token().clone()),
            None => (0, crate::store::MountToken::new()),
        };
        StateHandle::new(self.path.clone(), generation, token, self.queue.clone())
    }

    fn next_slot(&mut self, found: &'static str) -> Result<(usize, Option<HookSlot>), RenderError> {
        let index = self.cursor;
        self.cursor += 1;
        match self.tx.hook(self.path, index) {
            Some(slot) if slot.kind_name() != found => Err(RenderError::HookMismatch {
                path: self.path.clone(),
                index,
                expected: slot.kind_name(),
                found,
            }),
            None if !self.first_render => Err(RenderError::HookMismatch {
                path: self.path.clone(),
                index,
                expected: "no hook",
                found,
            }),
            slot => Ok((index, slot)),
        }
    }

    pub(crate) fn finish(self) -> Result<(), RenderError> {
        let stored = self.tx.hook_count(self.path);
        if self.cursor < stored {
            let expected = self
                .tx
                .hook(self.path, self.cursor)
                .map(|slot| slot.kind_name())
                .unwrap_or("no hook");
            return Err(RenderError::HookMismatch {
                path: self.path.clone(),
                index: self.cursor,
                expected,
                found: "no hook",
            });
        }
        Ok(())
    }
}
