//! Reactive Primitives
//!
//! This module implements the observable cells that drive re-rendering:
//! signals (primary, externally settable) and memos (derived, lazily
//! recomputed).
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking frame (a component render or a memo recomputation), the
//! read is recorded. When the value changes, every subscriber is notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only
//! when one of its sources changed and someone reads it again.
//!
//! # Implementation Notes
//!
//! Reads are recorded in a thread-local stack of tracking frames. Whoever
//! pushed the frame (a component context or a memo) diffs the recorded set
//! against its current subscriptions afterwards, subscribing to new cells
//! and dropping cells that were not read this time.

mod context;
mod memo;
mod signal;
mod subscriber;

pub use context::{is_tracking, untracked};
pub use memo::{Memo, MemoState};
pub use signal::Signal;
pub use subscriber::{CellId, SubscriberId, Subscription};

pub(crate) use context::{current_component, Observer, ReadSet, TrackingScope};
