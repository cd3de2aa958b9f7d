//! Change journal making a render pass atomic with respect to instance state.
//!
//! Every write to the store during a pass goes through [`Transaction`], which
//! records enough to undo it. [`Journal::scope`] commits the changes when the
//! closure succeeds and unwinds them in reverse order when it fails.

use indexmap::IndexMap;

use crate::element::Element;
use crate::error::StateError;
use crate::path::InstancePath;
use crate::props::PropValue;
use crate::store::{HookSlot, Instance, InstanceKind, InstanceStore};

/// One recorded state field write.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldChange {
    pub target: InstancePath,
    pub field: String,
    pub previous: Option<PropValue>,
    pub new: PropValue,
}

impl FieldChange {
    pub fn had_previous(&self) -> bool {
        self.previous.is_some()
    }
}

enum Change {
    Field { change: FieldChange, tracked: bool },
    Hook {
        target: InstancePath,
        index: usize,
        previous: Option<HookSlot>,
    },
    Mounted { path: InstancePath },
    Unmounted { instance: Box<Instance> },
    Element { path: InstancePath, previous: Element },
    Children {
        path: InstancePath,
        previous: Vec<InstancePath>,
    },
}

#[derive(Default)]
pub struct Journal {
    changes: Vec<Change>,
}

impl Journal {
    /// Runs `f` against a transaction over `store`. On `Ok` the changes stand
    /// and the net tracked field changes are returned alongside the value; on
    /// `Err` every change is undone before the error is handed back.
    pub fn scope<T, E>(
        store: &mut InstanceStore,
        f: impl FnOnce(&mut Transaction) -> Result<T, E>,
    ) -> Result<(T, Vec<FieldChange>), E> {
        let mut tx = Transaction::new(std::mem::take(store));
        match f(&mut tx) {
            Ok(value) => {
                let (committed, net) = tx.commit();
                *store = committed;
                Ok((value, net))
            }
            Err(err) => {
                *store = tx.rollback();
                Err(err)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Store plus the journal recording every mutation applied to it.
pub struct Transaction {
    store: InstanceStore,
    journal: Journal,
}

impl Transaction {
    fn new(store: InstanceStore) -> Self {
        Self {
            store,
            journal: Journal::default(),
        }
    }

    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Tracked state write; counts towards the follow-up render request.
    /// Returns whether the value changed.
    pub fn set_field(
        &mut self,
        target: &InstancePath,
        field: &str,
        value: PropValue,
    ) -> Result<bool, StateError> {
        self.write_field(target, field, value, true)
    }

    pub(crate) fn write_field(
        &mut self,
        target: &InstancePath,
        field: &str,
        value: PropValue,
        tracked: bool,
    ) -> Result<bool, StateError> {
        let instance = self
            .store
            .get_mut(target)
            .ok_or_else(|| StateError::Unmounted {
                path: target.clone(),
            })?;
        let InstanceKind::Component { state, .. } = &mut instance.kind else {
            return Err(StateError::Stateless {
                path: target.clone(),
            });
        };
        let previous = state.insert(field.to_owned(), value.clone());
        let changed = previous.as_ref() != Some(&value);
        self.journal.changes.push(Change::Field {
            change: FieldChange {
                target: target.clone(),
                field: field.to_owned(),
                previous,
                new: value,
            },
            tracked,
        });
        Ok(changed)
    }

    pub(crate) fn hook(&self, target: &InstancePath, index: usize) -> Option<HookSlot> {
        match &self.store.get(target)?.kind {
            InstanceKind::Component { hooks, .. } => hooks.get(index).cloned(),
            InstanceKind::Host { .. } => None,
        }
    }

    pub(crate) fn hook_count(&self, target: &InstancePath) -> usize {
        match self.store.get(target).map(|instance| &instance.kind) {
            Some(InstanceKind::Component { hooks, .. }) => hooks.len(),
            _ => 0,
        }
    }

    /// Writes hook slot `index`; a slot one past the end is appended.
    pub(crate) fn set_hook(&mut self, target: &InstancePath, index: usize, slot: HookSlot) {
        let Some(InstanceKind::Component { hooks, .. }) =
            self.store.get_mut(target).map(|instance| &mut instance.kind)
        else {
            return;
        };
        let previous = if index < hooks.len() {
            Some(std::mem::replace(&mut hooks[index], slot))
        } else {
            debug_assert_eq!(index, hooks.len());
            hooks.push(slot);
            None
        };
        self.journal.changes.push(Change::Hook {
            target: target.clone(),
            index,
            previous,
        });
    }

    pub(crate) fn next_generation(&mut self) -> u64 {
        self.store.next_generation()
    }

    pub(crate) fn mount(&mut self, instance: Instance) {
        let path = instance.path.clone();
        if let Some(stale) = self.store.insert(instance) {
            self.journal.changes.push(Change::Unmounted {
                instance: Box::new(stale),
            });
        }
        self.journal.changes.push(Change::Mounted { path });
    }

    pub(crate) fn unmount(&mut self, path: &InstancePath) -> Option<Instance> {
        let instance = self.store.remove(path)?;
        self.journal.changes.push(Change::Unmounted {
            instance: Box::new(instance.clone()),
        });
        Some(instance)
    }

    /// Swaps in the element of the current render, returning the previous one.
    pub(crate) fn replace_element(&mut self, path: &InstancePath, element: Element) -> Option<Element> {
        let instance = self.store.get_mut(path)?;
        let previous = std::mem::replace(&mut instance.element, element);
        self.journal.changes.push(Change::Element {
            path: path.clone(),
            previous: previous.clone(),
        });
        Some(previous)
    }

    pub(crate) fn replace_children(&mut self, path: &InstancePath, children: Vec<InstancePath>) {
        if let Some(instance) = self.store.get_mut(path) {
            let previous = std::mem::replace(&mut instance.children, children);
            self.journal.changes.push(Change::Children {
                path: path.clone(),
                previous,
            });
        }
    }

    fn commit(self) -> (InstanceStore, Vec<FieldChange>) {
        let mut net: IndexMap<(InstancePath, String), FieldChange> = IndexMap::new();
        for change in self.journal.changes {
            let Change::Field {
                change,
                tracked: true,
            } = change
            else {
                continue;
            };
            let key = (change.target.clone(), change.field.clone());
            match net.get_mut(&key) {
                Some(existing) => existing.new = change.new,
                None => {
                    net.insert(key, change);
                }
            }
        }
        let store = self.store;
        let net = net
            .into_values()
            .filter(|change| {
                store.contains(&change.target) && change.previous.as_ref() != Some(&change.new)
            })
            .collect();
        (store, net)
    }

    fn rollback(mut self) -> InstanceStore {
        while let Some(change) = self.journal.changes.pop() {
            match change {
                Change::Field { change, .. } => {
                    let Some(InstanceKind::Component { state, .. }) = self
                        .store
                        .get_mut(&change.target)
                        .map(|instance| &mut instance.kind)
                    else {
                        continue;
                    };
                    match change.previous {
                        Some(previous) => {
                            state.insert(change.field, previous);
                        }
                        None => {
                            state.shift_remove(&change.field);
                        }
                    }
                }
                Change::Hook {
                    target,
                    index,
                    previous,
                } => {
                    let Some(InstanceKind::Component { hooks, .. }) = self
                        .store
                        .get_mut(&target)
                        .map(|instance| &mut instance.kind)
                    else {
                        continue;
                    };
                    match previous {
                        Some(previous) => hooks[index] = previous,
                        None => hooks.truncate(index),
                    }
                }
                Change::Mounted { path } => {
                    self.store.remove(&path);
                }
                Change::Unmounted { instance } => {
                    self.store.insert(*instance);
                }
                Change::Element { path, previous } => {
                    if let Some(instance) = self.store.get_mut(&path) {
                        instance.element = previous;
                    }
                }
                Change::Children { path, previous } => {
                    if let Some(instance) = self.store.get_mut(&path) {
                        instance.children = previous;
                    }
                }
            }
        }
        self.store
    }
}
