//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive rendering
//! engine. It implements:
//!
//! - Reactive primitives (signals and lazily derived memos)
//! - Components with positional hook state
//! - A virtual tree and a reconciler that patches a host element tree
//! - Delegated event handling and coalesced, parent-first re-rendering
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: observable cells and dependency tracking
//! - `component`: component types, per-instance contexts, and hooks
//! - `vdom`: virtual nodes and the tree-construction primitive
//! - `host`: the in-memory host document the reconciler targets
//! - `reconcile`: the patch algorithm
//! - `runtime`: mounting, scheduling, error surfacing
//!
//! Everything is single threaded. Background work runs on a
//! [`tokio::task::LocalSet`].
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::{children, h, use_state, Component, Document, Props, RenderResult, Runtime};
//!
//! fn counter(_: &Props) -> RenderResult {
//!     let count = use_state(0)?;
//!     let click = count.clone();
//!     Ok(h(
//!         "button",
//!         Props::new().on("click", move |_| click.update(|n| n + 1)),
//!         children![count.get()],
//!     ))
//! }
//!
//! const COUNTER: Component = Component::new("Counter", counter);
//!
//! let runtime = Runtime::new(Document::new());
//! let root = runtime.document().body().clone();
//! runtime.mount(COUNTER, &root, Props::new());
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod host;
pub mod reactive;
pub mod runtime;
pub mod vdom;

mod events;
mod reconcile;
mod scheduler;

pub use component::{
    use_callback, use_derived, use_effect, use_memo, use_ref, use_state, Cleanup, Component,
    HookRef, RenderResult,
};
pub use config::RuntimeConfig;
pub use error::{CellError, ConfigError, HookError, RenderError};
pub use host::{Document, Event, HostNode, MutationStats};
pub use reactive::{untracked, Memo, Signal, Subscription};
pub use runtime::{ErrorSurface, LogSurface, Runtime};
pub use vdom::{construct, construct as h, fragment, Key, NodeType, PropValue, Props, VNode};
