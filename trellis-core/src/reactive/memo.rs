//! Memo Implementation
//!
//! A Memo is a derived cell: a cached value computed from other cells.
//!
//! # How Memos Work
//!
//! 1. The computation does not run until the first read.
//!
//! 2. A read of a fresh memo returns the cached value.
//!
//! 3. When a source cell changes, the memo is marked stale and its own
//!    subscribers are told. Nothing is recomputed yet. Every further
//!    change while stale is passed on as well, so an observer that
//!    subscribed after the first notice (or ignored it) still hears the
//!    next one.
//!
//! 4. The next read recomputes inside a tracking frame, then diffs the cells
//!    read this time against the previous sources: dropped sources are
//!    unsubscribed, new ones subscribed. Conditional reads therefore keep the
//!    dependency set exact.
//!
//! # Failure Modes
//!
//! - A computation that reads its own memo (directly or through other memos)
//!   gets the last cached value instead of recursing.
//! - A computation that panics is logged; the memo keeps its last good value.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{error, trace, warn};

use super::context::{self, Observer, ReadSet, TrackingScope};
use super::subscriber::{CellId, Subscription, SubscriberId, Trackable};
use crate::config::SUBSCRIBER_LIMIT;
use crate::error::{isolate, CellError};

/// Freshness of a memo's cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value reflects the current sources.
    Clean,

    /// A source changed (or the memo never ran); the next read recomputes.
    Dirty,
}

type Invalidate = Rc<dyn Fn()>;

pub(crate) struct MemoInner<T> {
    id: CellId,
    compute: Box<dyn Fn() -> T>,
    cached: RefCell<Option<T>>,
    stale: Cell<bool>,
    computing: Cell<bool>,
    sources: RefCell<IndexMap<CellId, Subscription>>,
    subscribers: RefCell<IndexMap<SubscriberId, Invalidate>>,
    destroyed: Cell<bool>,
}

/// A cached derived value that recomputes lazily when its sources change.
///
/// ```rust
/// use trellis_core::reactive::{Memo, Signal};
///
/// let count = Signal::new(2);
/// let doubled = Memo::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), Some(4));
/// count.set(5);
/// assert_eq!(doubled.get(), Some(10));
/// ```
pub struct Memo<T>
where
    T: Clone + 'static,
{
    inner: Rc<MemoInner<T>>,
}

impl<T> Memo<T>
where
    T: Clone + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self {
            inner: Rc::new(MemoInner {
                id: CellId::new(),
                compute: Box::new(compute),
                cached: RefCell::new(None),
                stale: Cell::new(true),
                computing: Cell::new(false),
                sources: RefCell::new(IndexMap::new()),
                subscribers: RefCell::new(IndexMap::new()),
                destroyed: Cell::new(false),
            }),
        }
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Get the current value, recomputing if stale.
    ///
    /// Returns `None` only when the computation has never succeeded.
    pub fn get(&self) -> Option<T> {
        if context::is_tracking() {
            context::record(self.inner.clone());
        }
        MemoInner::refresh(&self.inner);
        self.inner.cached.borrow().clone()
    }

    /// Get the cached value without tracking or recomputing.
    pub fn get_untracked(&self) -> Option<T> {
        self.inner.cached.borrow().clone()
    }

    /// Force the next read to recompute.
    pub fn mark_dirty(&self) {
        self.inner.invalidate();
    }

    /// Register a callback invoked whenever one of the memo's sources changes.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription, CellError>
    where
        F: Fn() + 'static,
    {
        MemoInner::subscribe(&self.inner, Rc::new(callback))
    }

    /// Release every source subscription and subscriber. Idempotent.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        trace!(cell = self.inner.id.raw(), "memo destroyed");
        let sources = std::mem::take(&mut *self.inner.sources.borrow_mut());
        for (_, subscription) in sources {
            subscription.unsubscribe();
        }
        self.inner.subscribers.borrow_mut().clear();
    }

    /// Whether [`destroy`](Self::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        if self.inner.stale.get() {
            MemoState::Dirty
        } else {
            MemoState::Clean
        }
    }

    /// Number of cells this memo currently depends on.
    pub fn source_count(&self) -> usize {
        self.inner.sources.borrow().len()
    }

    /// Number of callbacks waiting on this memo.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.cached.borrow().is_some()
    }
}

impl<T> MemoInner<T>
where
    T: Clone + 'static,
{
    fn refresh(this: &Rc<Self>) {
        if this.destroyed.get() || !this.stale.get() {
            return;
        }
        if this.computing.get() {
            warn!(cell = this.id.raw(), "memo read itself while computing; using cached value");
            return;
        }

        this.computing.set(true);
        let scope = TrackingScope::enter(Observer::Derived(this.id));
        let outcome = isolate(|| (this.compute)());
        let reads = scope.finish();
        this.computing.set(false);

        match outcome {
            Ok(value) => *this.cached.borrow_mut() = Some(value),
            Err(message) => {
                error!(cell = this.id.raw(), %message, "memo computation failed; keeping last value")
            }
        }
        Self::resubscribe(this, reads);
        this.stale.set(false);
    }

    fn resubscribe(this: &Rc<Self>, reads: ReadSet) {
        let mut sources = this.sources.borrow_mut();

        let dropped: SmallVec<[CellId; 4]> = sources
            .keys()
            .filter(|id| !reads.contains_key(*id))
            .copied()
            .collect();
        for id in dropped {
            if let Some(subscription) = sources.shift_remove(&id) {
                subscription.unsubscribe();
            }
        }

        for (id, cell) in reads {
            if sources.contains_key(&id) {
                continue;
            }
            let weak: Weak<Self> = Rc::downgrade(this);
            let on_change: Rc<dyn Fn()> = Rc::new(move || {
                if let Some(memo) = weak.upgrade() {
                    memo.invalidate();
                }
            });
            match cell.watch(on_change) {
                Ok(subscription) => {
                    sources.insert(id, subscription);
                }
                Err(err) => warn!(cell = this.id.raw(), source = id.raw(), %err, "memo could not watch source"),
            }
        }
    }

    fn invalidate(&self) {
        if self.destroyed.get() {
            return;
        }
        self.stale.set(true);
        let snapshot: SmallVec<[(SubscriberId, Invalidate); 4]> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(id, callback)| (*id, callback.clone()))
            .collect();
        for (id, callback) in snapshot {
            if self.destroyed.get() {
                break;
            }
            if let Err(message) = isolate(|| callback()) {
                warn!(cell = self.id.raw(), %message, "subscriber panicked; removing it");
                self.subscribers.borrow_mut().shift_remove(&id);
            }
        }
    }

    fn subscribe(this: &Rc<Self>, callback: Invalidate) -> Result<Subscription, CellError> {
        if this.destroyed.get() {
            return Err(CellError::Destroyed);
        }
        let mut subscribers = this.subscribers.borrow_mut();
        if subscribers.len() >= SUBSCRIBER_LIMIT {
            return Err(CellError::SubscriberLimit {
                limit: SUBSCRIBER_LIMIT,
            });
        }
        let id = SubscriberId::new();
        subscribers.insert(id, callback);

        let weak: Weak<Self> = Rc::downgrade(this);
        Ok(Subscription::new(this.id, move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.borrow_mut().shift_remove(&id);
            }
        }))
    }
}

impl<T> Trackable for MemoInner<T>
where
    T: Clone + 'static,
{
    fn cell_id(&self) -> CellId {
        self.id
    }

    fn watch(self: Rc<Self>, on_change: Rc<dyn Fn()>) -> Result<Subscription, CellError> {
        MemoInner::subscribe(&self, on_change)
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("cached", &self.get_untracked())
            .field("source_count", &self.source_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
