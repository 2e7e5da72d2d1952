//! Tracking Context
//!
//! The tracking stack records which computation is currently running so
//! that reading a cell can register it as a dependency.
//!
//! # Implementation
//!
//! Each thread has a stack of frames. Rendering a component pushes a frame
//! for its context, recomputing a memo pushes a frame for the memo, and
//! [`untracked`] pushes a frame that records nothing. Reads land in the
//! innermost frame only, so a memo read during a component render is a
//! dependency of the component while the memo's own reads stay with the memo.
//!
//! The stack is per thread rather than per runtime because cells are not
//! bound to a runtime: a global store created outside any component must
//! still register with whichever component reads it.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::subscriber::{CellId, Trackable};
use crate::component::ComponentContext;

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Cells read during one frame, in first-read order.
pub(crate) type ReadSet = IndexMap<CellId, Rc<dyn Trackable>>;

/// Who owns a tracking frame.
pub(crate) enum Observer {
    /// A component render pass.
    Component(Rc<ComponentContext>),
    /// A memo recomputation.
    Derived(CellId),
    /// Tracking suspended.
    Untracked,
}

struct Frame {
    observer: Observer,
    reads: ReadSet,
}

/// Guard for an entered frame.
///
/// The frame is popped by [`finish`](TrackingScope::finish), or on drop if
/// the computation unwound before finishing.
pub(crate) struct TrackingScope {
    depth: usize,
    finished: bool,
}

impl TrackingScope {
    /// Push a new frame for `observer`.
    pub(crate) fn enter(observer: Observer) -> Self {
        let depth = FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            frames.push(Frame {
                observer,
                reads: IndexMap::new(),
            });
            frames.len()
        });
        Self {
            depth,
            finished: false,
        }
    }

    /// Pop the frame and return the cells read while it was active.
    pub(crate) fn finish(mut self) -> ReadSet {
        self.finished = true;
        self.pop().map(|frame| frame.reads).unwrap_or_default()
    }

    fn pop(&self) -> Option<Frame> {
        FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            debug_assert_eq!(
                frames.len(),
                self.depth,
                "tracking frames popped out of order"
            );
            frames.pop()
        })
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        if !self.finished {
            self.pop();
        }
    }
}

/// Whether a read right now would be recorded.
pub fn is_tracking() -> bool {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .last()
            .is_some_and(|frame| !matches!(frame.observer, Observer::Untracked))
    })
}

/// Record a read of `cell` in the innermost frame.
pub(crate) fn record(cell: Rc<dyn Trackable>) {
    FRAMES.with(|frames| {
        if let Some(frame) = frames.borrow_mut().last_mut() {
            match frame.observer {
                Observer::Untracked => {}
                // A memo never depends on itself.
                Observer::Derived(id) if id == cell.cell_id() => {}
                _ => {
                    frame.reads.entry(cell.cell_id()).or_insert(cell);
                }
            }
        }
    })
}

/// The component whose render pass is currently running, if the innermost
/// frame belongs to one.
pub(crate) fn current_component() -> Option<Rc<ComponentContext>> {
    FRAMES.with(|frames| match frames.borrow().last() {
        Some(Frame {
            observer: Observer::Component(context),
            ..
        }) => Some(context.clone()),
        _ => None,
    })
}

/// Run `f` without recording any reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let scope = TrackingScope::enter(Observer::Untracked);
    let result = f();
    scope.finish();
    result
}
