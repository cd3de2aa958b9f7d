#![doc = r"Reconciliation engine and render scheduler for the Arbor declarative UI runtime."]

extern crate self as arbor_core;

pub mod collections;
pub mod command;
pub mod context;
pub mod element;
pub mod error;
pub mod journal;
mod key;
pub mod path;
pub mod platform;
pub mod props;
pub mod queue;
mod reconciler;
pub mod scheduler;
mod siblings;
pub mod store;

pub use command::{
    downcast_node_mut, Applier, Command, CommandKind, CommandList, MemoryApplier, Node, WidgetId,
};
pub use context::RenderContext;
pub use element::{Component, ComponentResult, Element, ElementBuilder, ElementType, Widget};
pub use error::{ApplyError, ComponentError, PassError, RenderError, StateError};
pub use journal::{FieldChange, Journal, Transaction};
pub use path::{InstanceKey, InstancePath};
pub use platform::{ManualTick, TickScheduler};
pub use props::{Callback, PropChange, PropValue, Props, PropsDiff, CHILDREN_PROP};
pub use queue::{RequestQueue, StateFields, StateHandle};
pub use scheduler::{Pass, Root, Scheduler, SchedulerConfig};
pub use store::{Cleanup, Instance, InstanceStore, MountToken};
