//! Subscriber types for the reactive system.
//!
//! A subscription connects a cell to a callback: a component waiting to
//! re-render, a memo waiting to go stale, or a user closure.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CellError;

/// Unique identifier for a subscriber.
///
/// Each registered callback gets its own ID so it can be removed without
/// comparing closures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for an observable cell (signal or memo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping the handle does *not* unsubscribe; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove the callback.
pub struct Subscription {
    cell: CellId,
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(cell: CellId, cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cell,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// The cell this subscription belongs to.
    pub fn cell(&self) -> CellId {
        self.cell
    }

    /// Remove the callback from the cell. Safe to call from inside the
    /// callback itself.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cell", &self.cell)
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A cell as seen by whoever read it: something with an identity that can
/// report changes.
///
/// Tracking frames collect these; component contexts and memos then diff
/// the collected set against what they are already subscribed to.
pub(crate) trait Trackable {
    fn cell_id(&self) -> CellId;

    /// Register a value-less change callback.
    fn watch(self: Rc<Self>, on_change: Rc<dyn Fn()>) -> Result<Subscription, CellError>;
}
