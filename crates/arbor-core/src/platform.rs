//! Host hooks the scheduler relies on.
//!
//! The core never spins up threads or event loops. When work is queued from
//! any thread it asks the host, through [`TickScheduler`], to call
//! [`Scheduler::tick`](crate::Scheduler::tick) on the owning thread soon.

/// Wakes the owning thread's event loop.
///
/// Implementations must be safe to call from any thread and must not run the
/// pass themselves.
pub trait TickScheduler: Send + Sync {
    /// Request that the host call `tick` on the owning thread.
    fn request_tick(&self);
}

/// Scheduler for hosts that poll `tick` on their own cadence.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualTick;

impl TickScheduler for ManualTick {
    fn request_tick(&self) {}
}
