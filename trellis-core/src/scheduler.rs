//! Re-render Scheduler
//!
//! Coalesces re-render requests so that many writes in one synchronous call
//! stack cost one render per affected component.
//!
//! # Algorithm
//!
//! 1. A request marks the context as scheduled and queues it. Requests for
//!    a context that is already queued or unmounted are dropped. A request
//!    for a context in the middle of its own render is remembered and
//!    queued once that render ends.
//! 2. The first request of a batch spawns a flush task on the local task
//!    set. The task waits out the coalescing window (one yield, or the
//!    configured delay) before running.
//! 3. The flush takes the whole queue, bumps the flush epoch, and renders
//!    the contexts ordered by component depth, parents first.
//! 4. A context already rendered during this epoch (because an ancestor's
//!    re-render patched it) is skipped.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, trace};

use crate::component::ComponentContext;
use crate::runtime::RuntimeInner;

#[derive(Default)]
pub(crate) struct Scheduler {
    queue: RefCell<Vec<Weak<ComponentContext>>>,
    flush_scheduled: Cell<bool>,
    epoch: Cell<u64>,
}

impl Scheduler {
    /// Queue a re-render of `context`.
    pub(crate) fn request(&self, runtime: &Rc<RuntimeInner>, context: &Rc<ComponentContext>) {
        if !context.is_mounted() {
            trace!(component = context.name(), "re-render dropped: unmounted");
            return;
        }
        if context.is_in_flight() {
            trace!(component = context.name(), "re-render deferred: render in flight");
            context.defer_rerender();
            return;
        }
        if context.mark_scheduled() {
            return;
        }
        self.queue.borrow_mut().push(Rc::downgrade(context));

        if !self.flush_scheduled.replace(true) {
            let delay = runtime.config.coalesce_delay_ms;
            let flusher = runtime.clone();
            runtime.spawn(async move {
                coalescing_window(delay).await;
                flusher.flush();
            });
        }
    }

    /// Take the queued contexts for one flush, parents first.
    pub(crate) fn take_batch(&self) -> Vec<Rc<ComponentContext>> {
        self.flush_scheduled.set(false);
        self.epoch.set(self.epoch.get() + 1);

        let queued = std::mem::take(&mut *self.queue.borrow_mut());
        let mut batch: Vec<Rc<ComponentContext>> =
            queued.iter().filter_map(Weak::upgrade).collect();
        batch.sort_by_key(|context| context.depth());
        debug!(epoch = self.epoch.get(), queued = batch.len(), "flushing re-renders");
        batch
    }

    /// Number of flushes started so far.
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    pub(crate) fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled.get()
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.borrow().len()
    }
}

async fn coalescing_window(delay_ms: u64) {
    if delay_ms == 0 {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}
