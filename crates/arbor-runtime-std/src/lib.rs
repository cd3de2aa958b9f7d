//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides a concrete [`TickScheduler`] for hosts with an event
//! loop, and a helper for running blocking work off the owning thread while
//! handing its results back through the request queue.

use std::fmt;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arbor_core::{Scheduler, SchedulerConfig, StateFields, StateHandle, TickScheduler};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

#[derive(Default)]
struct TickState {
    pending: bool,
    requests: u64,
    waker: Option<Waker>,
}

/// Tick scheduler for hosts driving the render loop from a thread of their
/// own.
///
/// Requests coalesce into a single pending tick. The host either polls with
/// [`take_tick_request`](Self::take_tick_request), blocks in
/// [`wait_for_tick`](Self::wait_for_tick), or registers a waker to forward
/// the request into its own event loop.
#[derive(Default)]
pub struct StdScheduler {
    state: Mutex<TickState>,
    ready: Condvar,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TickState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consumes the pending tick, if any.
    pub fn take_tick_request(&self) -> bool {
        std::mem::take(&mut self.state().pending)
    }

    /// Blocks until a tick is pending or `timeout` elapses, then consumes it.
    pub fn wait_for_tick(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state();
        while !state.pending {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            state = self
                .ready
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        state.pending = false;
        true
    }

    /// Number of tick requests received so far, coalesced or not.
    pub fn request_count(&self) -> u64 {
        self.state().requests
    }

    pub fn set_tick_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.state().waker = Some(Arc::new(waker));
    }

    pub fn clear_tick_waker(&self) {
        self.state().waker = None;
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("StdScheduler")
            .field("pending", &state.pending)
            .field("requests", &state.requests)
            .finish_non_exhaustive()
    }
}

impl TickScheduler for StdScheduler {
    fn request_tick(&self) {
        let waker = {
            let mut state = self.state();
            state.pending = true;
            state.requests += 1;
            state.waker.clone()
        };
        self.ready.notify_all();
        // Outside the lock: the waker may call back into the scheduler.
        if let Some(waker) = waker {
            waker();
        }
    }
}

/// Convenience container around the standard tick scheduler.
#[derive(Clone, Debug, Default)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the scheduler implementation.
    pub fn tick_scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Creates a render scheduler whose queue wakes this runtime.
    pub fn create_scheduler(&self, config: SchedulerConfig) -> Scheduler {
        Scheduler::with_tick_scheduler(self.tick_scheduler(), config)
    }

    /// Returns whether a tick was requested since the last poll.
    pub fn take_tick_request(&self) -> bool {
        self.scheduler.take_tick_request()
    }

    /// Blocks until the next tick request or `timeout`.
    pub fn wait_for_tick(&self, timeout: Duration) -> bool {
        self.scheduler.wait_for_tick(timeout)
    }

    pub fn set_tick_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_tick_waker(waker);
    }

    pub fn clear_tick_waker(&self) {
        self.scheduler.clear_tick_waker();
    }
}

/// Worker thread started by [`spawn_background`].
#[derive(Debug)]
pub struct BackgroundTask {
    handle: JoinHandle<bool>,
}

impl BackgroundTask {
    /// Waits for the worker. Returns whether its result was queued.
    pub fn join(self) -> thread::Result<bool> {
        self.handle.join()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Runs `work` on a new thread and queues its state writes for the instance
/// behind `handle`.
///
/// The worker never touches the store or widgets directly. If the instance
/// is unmounted by the time the work finishes, the result is discarded.
pub fn spawn_background(
    handle: StateHandle,
    work: impl FnOnce() -> StateFields + Send + 'static,
) -> io::Result<BackgroundTask> {
    let name = format!("arbor-bg{}", handle.path());
    let worker = thread::Builder::new().name(name).spawn(move || {
        let fields = work();
        if !handle.is_mounted() {
            log::debug!("discarding background result for unmounted {}", handle.path());
            return false;
        }
        match handle.set_state(fields) {
            Ok(()) => true,
            Err(err) => {
                log::debug!("background result for {} dropped: {err}", handle.path());
                false
            }
        }
    })?;
    Ok(BackgroundTask { handle: worker })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    use arbor_core::{
        Component, ComponentResult, Element, InstancePath, Props, RenderContext, SchedulerConfig,
    };
    use arbor_testing::{text, TestHost};

    use super::*;

    struct Status;

    impl Component for Status {
        fn render(&self, _props: &Props, cx: &mut RenderContext<'_>) -> ComponentResult {
            let status = cx.use_state("status", || "loading".into())?;
            Ok(text(status.as_str().unwrap_or_default()))
        }
    }

    #[test]
    fn std_scheduler_flags_and_wakes() {
        let runtime = StdRuntime::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        {
            let wakes = Arc::clone(&wakes);
            runtime.set_tick_waker(move || {
                wakes.fetch_add(1, Ordering::SeqCst);
            });
        }
        let scheduler = runtime.create_scheduler(SchedulerConfig::default());
        scheduler
            .queue()
            .request_render(InstancePath::root())
            .expect("queue open");

        assert!(runtime.take_tick_request());
        assert!(!runtime.take_tick_request());
        assert_eq!(wakes.load(Ordering::SeqCst), 1);

        runtime.clear_tick_waker();
        scheduler
            .queue()
            .request_render(InstancePath::root())
            .expect("queue open");
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn requests_coalesce_into_one_tick() {
        let scheduler = StdScheduler::new();
        scheduler.request_tick();
        scheduler.request_tick();

        assert_eq!(scheduler.request_count(), 2);
        assert!(scheduler.take_tick_request());
        assert!(!scheduler.take_tick_request());
    }

    #[test]
    fn waiting_host_wakes_on_request_from_another_thread() {
        let runtime = StdRuntime::new();
        let scheduler = runtime.create_scheduler(SchedulerConfig::default());
        assert!(!runtime.wait_for_tick(Duration::from_millis(10)));

        let queue = scheduler.queue().clone();
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            queue.request_render(InstancePath::root())
        });

        assert!(runtime.wait_for_tick(Duration::from_secs(5)));
        sender
            .join()
            .expect("sender finished")
            .expect("queue open");
        assert!(!runtime.take_tick_request());
        assert_eq!(runtime.tick_scheduler().request_count(), 1);
    }

    #[test]
    fn background_result_reaches_mounted_instance() {
        let runtime = StdRuntime::new();
        let mut scheduler = runtime.create_scheduler(SchedulerConfig::default());
        let mut host = TestHost::new();
        scheduler.set_root(Element::component(Status));
        scheduler
            .tick()
            .expect("render succeeds")
            .expect("pass")
            .apply(&mut host)
            .expect("apply succeeds");
        assert!(runtime.take_tick_request());

        let handle = scheduler
            .state_handle(&InstancePath::root())
            .expect("root mounted");
        let task = spawn_background(handle, || vec![("status".into(), "ready".into())])
            .expect("thread spawns");
        assert!(task.join().expect("worker finished"));
        assert!(runtime.take_tick_request());

        scheduler
            .tick()
            .expect("render succeeds")
            .expect("pass")
            .apply(&mut host)
            .expect("apply succeeds");
        let root = host.root().expect("root widget");
        assert_eq!(host.text_of(root), Some("ready"));
    }

    #[test]
    fn background_result_for_unmounted_instance_is_discarded() {
        let mut scheduler = Scheduler::new();
        let mut host = TestHost::new();
        scheduler.set_root(Element::component(Status));
        scheduler
            .tick()
            .expect("render succeeds")
            .expect("pass")
            .apply(&mut host)
            .expect("apply succeeds");
        let handle = scheduler
            .state_handle(&InstancePath::root())
            .expect("root mounted");

        let (release, gate) = mpsc::channel::<()>();
        let task = spawn_background(handle, move || {
            gate.recv().expect("released");
            vec![("status".into(), "late".into())]
        })
        .expect("thread spawns");

        scheduler.set_root(text("gone"));
        scheduler
            .tick()
            .expect("render succeeds")
            .expect("pass")
            .apply(&mut host)
            .expect("apply succeeds");
        release.send(()).expect("worker waiting");

        assert!(!task.join().expect("worker finished"));
        assert!(scheduler.tick().expect("tick succeeds").is_none());
        let root = host.root().expect("root widget");
        assert_eq!(host.text_of(root), Some("gone"));
    }
}
