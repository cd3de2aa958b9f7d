use arbor_core::{
    CommandKind, Element, InstancePath, InstanceStore, PassError, RequestQueue, Scheduler,
    SchedulerConfig, StateHandle, WidgetId,
};

use crate::host::TestHost;

/// Command target and kind, as recorded for assertions.
pub type RecordedCommand = (Option<WidgetId>, CommandKind);

/// Headless harness driving a [`Scheduler`] against a [`TestHost`].
///
/// Every pass is applied immediately, and the kinds of its commands are
/// returned so tests can assert on emission order.
pub struct TestRoot {
    scheduler: Scheduler,
    host: TestHost,
}

impl TestRoot {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            scheduler: Scheduler::with_config(config),
            host: TestHost::new(),
        }
    }

    /// Install `element` as the root and run exactly one pass.
    pub fn render(&mut self, element: impl Into<Element>) -> Result<Vec<RecordedCommand>, PassError> {
        self.scheduler.set_root(element);
        Ok(self.tick()?.unwrap_or_default())
    }

    /// Run one pass if anything is pending. `None` means nothing ran.
    pub fn tick(&mut self) -> Result<Option<Vec<RecordedCommand>>, PassError> {
        let Some(pass) = self.scheduler.tick()? else {
            return Ok(None);
        };
        let kinds = pass.kinds();
        pass.apply(&mut self.host)?;
        Ok(Some(kinds))
    }

    /// Run passes until the scheduler is idle, returning how many ran.
    pub fn pump_until_idle(&mut self) -> Result<usize, PassError> {
        let mut passes = 0;
        while self.tick()?.is_some() {
            passes += 1;
        }
        Ok(passes)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn host(&self) -> &TestHost {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut TestHost {
        &mut self.host
    }

    pub fn queue(&self) -> &RequestQueue {
        self.scheduler.queue()
    }

    pub fn store(&self) -> &InstanceStore {
        self.scheduler.store()
    }

    pub fn handle(&self, path: &InstancePath) -> Option<StateHandle> {
        self.scheduler.state_handle(path)
    }

    /// Host widget currently standing for `path`.
    pub fn widget_at(&self, path: &InstancePath) -> Option<WidgetId> {
        self.scheduler.store().host_widget(path)
    }

    pub fn text_at(&self, path: &InstancePath) -> Option<&str> {
        self.host.text_of(self.widget_at(path)?)
    }

    pub fn root_widget(&self) -> Option<WidgetId> {
        self.scheduler.root_widget()
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `TestRoot`.
pub fn run_test_root<R>(f: impl FnOnce(&mut TestRoot) -> R) -> R {
    let mut root = TestRoot::new();
    f(&mut root)
}

/// Path made of explicit keys, e.g. `path(&["list", "a"])`.
pub fn path(keys: &[&str]) -> InstancePath {
    keys.iter()
        .fold(InstancePath::root(), |path, key| path.child(*key))
}
