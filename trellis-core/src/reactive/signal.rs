//! Signal Implementation
//!
//! A Signal is the primary observable cell. It holds a value and tracks
//! which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a tracking frame (component render or
//!    memo recomputation), the signal registers itself in that frame.
//!
//! 2. When a signal's value changes, every subscriber is notified with the
//!    new value. Writing a value equal to the current one does nothing.
//!
//! 3. Notification iterates over a snapshot of the subscriber set, so a
//!    callback may unsubscribe itself (or others) without skipping anyone
//!    in the same pass.
//!
//! # Threading
//!
//! The engine is single-threaded; signals are `Rc`-shared and use
//! `RefCell` for interior mutability.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{trace, warn};

use super::context;
use super::subscriber::{CellId, Subscription, SubscriberId, Trackable};
use crate::config::SUBSCRIBER_LIMIT;
use crate::error::{isolate, CellError};

type Callback<T> = Rc<dyn Fn(&T)>;

pub(crate) struct SignalInner<T> {
    id: CellId,
    value: RefCell<T>,
    subscribers: RefCell<IndexMap<SubscriberId, Callback<T>>>,
    destroyed: Cell<bool>,
}

/// A reactive signal holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The type of value stored in the signal. `PartialEq` lets writes of
///   an unchanged value skip notification.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    inner: Rc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: CellId::new(),
                value: RefCell::new(value),
                subscribers: RefCell::new(IndexMap::new()),
                destroyed: Cell::new(false),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> CellId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a tracking frame, this also registers the signal
    /// as a dependency of the running computation.
    pub fn get(&self) -> T {
        if context::is_tracking() {
            context::record(self.inner.clone());
        }
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Run `f` against the current value. Tracks like [`get`](Self::get).
    ///
    /// `f` sees a snapshot, so it may write this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.get();
        f(&value)
    }

    /// Set a new value and notify subscribers.
    ///
    /// Ignored once the signal is destroyed, and a no-op when `value`
    /// equals the current value.
    pub fn set(&self, value: T) {
        self.inner.write(value);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = f(&self.inner.value.borrow());
        self.set(new_value);
    }

    /// Register a callback invoked with the new value after every change.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription, CellError>
    where
        F: Fn(&T) + 'static,
    {
        SignalInner::subscribe(&self.inner, Rc::new(callback))
    }

    /// Drop every subscriber and stop accepting writes. Idempotent.
    ///
    /// The last value stays readable, so a destroyed signal still renders
    /// its final state. Anything the value holds is freed when the last
    /// handle to the signal is dropped.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        trace!(cell = self.inner.id.raw(), "signal destroyed");
        self.inner.subscribers.borrow_mut().clear();
    }

    /// Whether [`destroy`](Self::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }
}

impl<T> SignalInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn write(&self, value: T) {
        if self.destroyed.get() {
            trace!(cell = self.id.raw(), "write to destroyed signal ignored");
            return;
        }
        if *self.value.borrow() == value {
            return;
        }
        *self.value.borrow_mut() = value;
        self.notify();
    }

    fn notify(&self) {
        let snapshot: SmallVec<[(SubscriberId, Callback<T>); 4]> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(id, callback)| (*id, callback.clone()))
            .collect();
        if snapshot.is_empty() {
            return;
        }
        let value = self.value.borrow().clone();

        for (id, callback) in snapshot {
            if self.destroyed.get() {
                break;
            }
            if let Err(message) = isolate(|| callback(&value)) {
                warn!(cell = self.id.raw(), %message, "subscriber panicked; removing it");
                self.subscribers.borrow_mut().shift_remove(&id);
            }
        }
    }

    fn subscribe(this: &Rc<Self>, callback: Callback<T>) -> Result<Subscription, CellError> {
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

impl<T> Trackable for SignalInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn cell_id(&self) -> CellId {
        self.id
    }

    fn watch(self: Rc<Self>, on_change: Rc<dyn Fn()>) -> Result<Subscription, CellError> {
        SignalInner::subscribe(&self, Rc::new(move |_: &T| on_change()))
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<usize>>, impl Fn(&i32) + 'static) {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        (calls, move |_: &i32| calls_clone.set(calls_clone.get() + 1))
    }

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn with_may_write_the_same_signal() {
        let signal = Signal::new(1);
        let doubled = signal.with(|v| {
            signal.set(v * 10);
            v * 2
        });
        assert_eq!(doubled, 2);
        assert_eq!(signal.get(), 10);
    }

    #[test]
    fn signal_notifies_subscribers_with_new_value() {
        let signal = Signal::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();

        let _subscription = signal
            .subscribe(move |v| seen_clone.borrow_mut().push(*v))
            .unwrap();

        signal.set(1);
        signal.set(2);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn equal_write_does_not_notify() {
        let signal = Signal::new(7);
        let (calls, callback) = counter();
        let _subscription = signal.subscribe(callback).unwrap();

        signal.set(7);
        assert_eq!(calls.get(), 0);

        signal.set(8);
        signal.set(8);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn signal_unsubscribe() {
        let signal = Signal::new(0);
        let (calls, callback) = counter();
        let subscription = signal.subscribe(callback).unwrap();

        signal.set(1);
        assert_eq!(calls.get(), 1);

        subscription.unsubscribe();
        signal.set(2);
        assert_eq!(calls.get(), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribing_during_notification_does_not_skip_others() {
        let signal = Signal::new(0);
        let own: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let own_clone = own.clone();

        let first = signal
            .subscribe(move |_| {
                if let Some(subscription) = own_clone.borrow_mut().take() {
                    subscription.unsubscribe();
                }
            })
            .unwrap();
        *own.borrow_mut() = Some(first);

        let (calls, callback) = counter();
        let _second = signal.subscribe(callback).unwrap();

        signal.set(1);
        assert_eq!(calls.get(), 1);
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn panicking_subscriber_is_removed() {
        let signal = Signal::new(0);
        let _bad = signal.subscribe(|_| panic!("subscriber failure")).unwrap();
        let (calls, callback) = counter();
        let _good = signal.subscribe(callback).unwrap();

        signal.set(1);
        assert_eq!(calls.get(), 1);
        assert_eq!(signal.subscriber_count(), 1);

        signal.set(2);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn destroy_is_idempotent() {
        let signal = Signal::new(0);
        let (calls, callback) = counter();
        let _subscription = signal.subscribe(callback).unwrap();

        signal.destroy();
        signal.destroy();

        assert!(signal.is_destroyed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(5);
        assert_eq!(signal.get(), 0);
        assert_eq!(calls.get(), 0);
        assert_eq!(signal.subscribe(|_| {}).unwrap_err(), CellError::Destroyed);
    }

    #[test]
    fn subscriber_limit_is_enforced() {
        let signal = Signal::new(0);
        let subscriptions: Vec<_> = (0..SUBSCRIBER_LIMIT)
            .map(|_| signal.subscribe(|_| {}).unwrap())
            .collect();

        assert_eq!(
            signal.subscribe(|_| {}).unwrap_err(),
            CellError::SubscriberLimit {
                limit: SUBSCRIBER_LIMIT
            }
        );
        drop(subscriptions);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);
        assert_eq!(signal1, signal2);
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
    }
}
