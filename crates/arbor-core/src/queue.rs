use std::fmt;
use std::sync::Arc;

use async_channel::{Receiver, Sender};

use crate::error::StateError;
use crate::path::InstancePath;
use crate::platform::TickScheduler;
use crate::props::PropValue;
use crate::store::MountToken;

/// Field writes carried by one state update, applied in order.
pub type StateFields = Vec<(String, PropValue)>;

#[derive(Debug)]
pub(crate) enum Message {
    Render {
        path: InstancePath,
    },
    SetState {
        path: InstancePath,
        /// Generation the sender saw; `None` targets whatever is mounted.
        generation: Option<u64>,
        fields: StateFields,
    },
}

/// Cross-thread entry point into a [`Scheduler`](crate::Scheduler).
///
/// Cloning is cheap. Posting never blocks; the host is woken through its
/// [`TickScheduler`] and processes the message on the next tick.
#[derive(Clone)]
pub struct RequestQueue {
    sender: Sender<Message>,
    waker: Arc<dyn TickScheduler>,
}

impl RequestQueue {
    pub(crate) fn new(waker: Arc<dyn TickScheduler>) -> (Self, Receiver<Message>) {
        let (sender, receiver) = async_channel::unbounded();
        (Self { sender, waker }, receiver)
    }

    /// Ask for the subtree at `path` to be rendered again.
    pub fn request_render(&self, path: InstancePath) -> Result<(), StateError> {
        self.post(Message::Render { path })
    }

    /// Queue state writes for the component at `path`.
    pub fn set_state(&self, path: InstancePath, fields: StateFields) -> Result<(), StateError> {
        self.post(Message::SetState {
            path,
            generation: None,
            fields,
        })
    }

    pub(crate) fn post(&self, message: Message) -> Result<(), StateError> {
        self.sender
            .try_send(message)
            .map_err(|_| StateError::QueueClosed)?;
        self.wake();
        Ok(())
    }

    pub(crate) fn wake(&self) {
        self.waker.request_tick();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestQueue")
            .field("pending", &self.sender.len())
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

/// Per-instance handle for asynchronous work.
///
/// The handle is `Send` and outlives the instance safely: once the instance
/// is unmounted every write through it fails with
/// [`StateError::Unmounted`], and writes racing the unmount are dropped by the
/// scheduler because the generation no longer matches.
#[derive(Clone, Debug)]
pub struct StateHandle {
    path: InstancePath,
    generation: u64,
    token: MountToken,
    queue: RequestQueue,
}

impl StateHandle {
    pub(crate) fn new(
        path: InstancePath,
        generation: u64,
        token: MountToken,
        queue: RequestQueue,
    ) -> Self {
        Self {
            path,
            generation,
            token,
            queue,
        }
    }

    pub fn path(&self) -> &InstancePath {
        &self.path
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_mounted(&self) -> bool {
        self.token.is_mounted()
    }

    pub fn set_state(&self, fields: StateFields) -> Result<(), StateError> {
        if !self.is_mounted() {
            return Err(StateError::Unmounted {
                path: self.path.clone(),
            });
        }
        self.queue.post(Message::SetState {
            path: self.path.clone(),
            generation: Some(self.generation),
            fields,
        })
    }

    /// Single-field shorthand for [`set_state`](Self::set_state).
    pub fn set(&self, field: impl Into<String>, value: impl Into<PropValue>) -> Result<(), StateError> {
        self.set_state(vec![(field.into(), value.into())])
    }

    pub fn request_render(&self) -> Result<(), StateError> {
        if !self.is_mounted() {
            return Err(StateError::Unmounted {
                path: self.path.clone(),
            });
        }
        self.queue.request_render(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ManualTick;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTick(AtomicUsize);

    impl TickScheduler for CountingTick {
        fn request_tick(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn posting_wakes_the_host() {
        let tick = Arc::new(CountingTick(AtomicUsize::new(0)));
        let (queue, receiver) = RequestQueue::new(tick.clone());
        queue.request_render(InstancePath::root()).unwrap();
        queue
            .set_state(InstancePath::root().child("a"), vec![("x".into(), 1.into())])
            .unwrap();
        assert_eq!(tick.0.load(Ordering::SeqCst), 2);
        assert_eq!(receiver.len(), 2);
    }

    #[test]
    fn handle_refuses_writes_after_unmount() {
        let (queue, receiver) = RequestQueue::new(Arc::new(ManualTick));
        let token = MountToken::new();
        let path = InstancePath::root().child("a");
        let handle = StateHandle::new(path.clone(), 3, token.clone(), queue);

        handle.set("x", 1).unwrap();
        token.unmount();
        assert!(!handle.is_mounted());
        assert_eq!(handle.set("x", 2), Err(StateError::Unmounted { path }));
        assert_eq!(receiver.len(), 1);
    }

    #[test]
    fn closed_queue_reports_error() {
        let (queue, receiver) = RequestQueue::new(Arc::new(ManualTick));
        drop(receiver);
        assert!(queue.is_closed());
        assert_eq!(
            queue.request_render(InstancePath::root()),
            Err(StateError::QueueClosed)
        );
    }
}
