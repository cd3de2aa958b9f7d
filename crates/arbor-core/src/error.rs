use thiserror::Error;

use crate::command::WidgetId;
use crate::path::InstancePath;

/// Error type returned by [`Component::render`](crate::Component::render).
pub type ComponentError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure while computing a render pass. The pass is rolled back and none of
/// its commands reach the host.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("component `{name}` at {path} failed to render")]
    Component {
        path: InstancePath,
        name: &'static str,
        #[source]
        source: ComponentError,
    },
    #[error("duplicate key `{key}` among the children of {parent}")]
    AmbiguousKey { parent: InstancePath, key: String },
    #[error("hook {index} of {path} changed from {expected} to {found} between renders")]
    HookMismatch {
        path: InstancePath,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("hook {index} of {path} declared state `{declared}` but now reads `{found}`")]
    StateFieldMismatch {
        path: InstancePath,
        index: usize,
        declared: String,
        found: String,
    },
    #[error("child widget {widget} of {parent} was neither kept nor destroyed")]
    UnresolvedChild { parent: WidgetId, widget: WidgetId },
    #[error(transparent)]
    State(#[from] StateError),
}

impl RenderError {
    pub(crate) fn from_component(
        path: &InstancePath,
        name: &'static str,
        source: ComponentError,
    ) -> Self {
        // Hook errors raised through `?` inside a render keep their own shape.
        match source.downcast::<RenderError>() {
            Ok(inner) => *inner,
            Err(source) => RenderError::Component {
                path: path.clone(),
                name,
                source,
            },
        }
    }
}

/// Failure to route a state change to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("instance {path} is no longer mounted")]
    Unmounted { path: InstancePath },
    #[error("instance {path} is a host widget and carries no state")]
    Stateless { path: InstancePath },
    #[error("render request queue is closed")]
    QueueClosed,
}

/// Failure while a host applies a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("widget {id} missing")]
    Missing { id: WidgetId },
    #[error("widget {id} already exists")]
    Occupied { id: WidgetId },
    #[error("widget {id} type mismatch; expected {expected}")]
    TypeMismatch { id: WidgetId, expected: &'static str },
}

/// Either half of a render-and-apply cycle failing.
#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
}
