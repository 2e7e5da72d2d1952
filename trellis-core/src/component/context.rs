//! Component Contexts
//!
//! One context per mounted component instance. It owns the instance's hook
//! slots, tracks which cells the last render read, and keeps exactly one
//! subscription per such cell. A change to any of them asks the scheduler
//! for a re-render.
//!
//! # Hook slots
//!
//! Hooks are matched to their state by call position. On every render the
//! cursor starts at zero and each hook claims the next slot. A slot holding
//! a different hook type is always an error; a different hook *count* is an
//! error when the runtime was configured with `check_hook_order`.

use std::any::{type_name, Any};
use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{error, trace, warn};

use super::hooks::Cleanup;
use super::{Component, Rendered};
use crate::error::{isolate, HookError, RenderError};
use crate::reactive::{CellId, Observer, ReadSet, Subscription, TrackingScope};
use crate::runtime::RuntimeInner;
use crate::vdom::{Props, VNode, WeakVNode};

/// State owned by one hook call site.
pub(crate) trait HookSlot: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Take the cleanup left by the last effect run.
    fn take_cleanup(&mut self) -> Option<Cleanup> {
        None
    }

    fn set_cleanup(&mut self, _cleanup: Cleanup) {}

    /// Release owned cells when the instance goes away.
    fn teardown(&mut self) {}
}

/// An effect queued during render, run after the commit.
pub(crate) struct PendingEffect {
    pub(crate) slot: usize,
    pub(crate) run: Box<dyn FnOnce() -> Option<Cleanup>>,
}

/// Per-instance state of a mounted component.
pub(crate) struct ComponentContext {
    id: u64,
    component: Component,
    runtime: Weak<RuntimeInner>,
    owner: RefCell<WeakVNode>,
    depth: usize,
    check_hook_order: bool,

    slots: RefCell<Vec<Box<dyn HookSlot>>>,
    cursor: Cell<usize>,
    rendered_once: Cell<bool>,
    pending_effects: RefCell<Vec<PendingEffect>>,

    subscriptions: RefCell<IndexMap<CellId, Subscription>>,
    rerender: OnceCell<Rc<dyn Fn()>>,

    mounted: Cell<bool>,
    in_flight: Cell<bool>,
    /// A re-render was requested while in flight.
    rerun: Cell<bool>,
    scheduled: Cell<bool>,
    generation: Cell<u64>,
    rendered_epoch: Cell<u64>,
}

thread_local! {
    static NEXT_CONTEXT_ID: Cell<u64> = const { Cell::new(0) };
}

impl ComponentContext {
    pub(crate) fn new(
        runtime: Weak<RuntimeInner>,
        component: Component,
        owner: &VNode,
        depth: usize,
        check_hook_order: bool,
    ) -> Rc<Self> {
        let id = NEXT_CONTEXT_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        trace!(context = id, component = component.name(), depth, "context created");
        Rc::new(Self {
            id,
            component,
            runtime,
            owner: RefCell::new(owner.downgrade()),
            depth,
            check_hook_order,
            slots: RefCell::new(Vec::new()),
            cursor: Cell::new(0),
            rendered_once: Cell::new(false),
            pending_effects: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(IndexMap::new()),
            rerender: OnceCell::new(),
            mounted: Cell::new(true),
            in_flight: Cell::new(false),
            rerun: Cell::new(false),
            scheduled: Cell::new(false),
            generation: Cell::new(0),
            rendered_epoch: Cell::new(0),
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        self.component.name()
    }

    /// Nesting depth among components; roots are zero.
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn owner(&self) -> Option<VNode> {
        self.owner.borrow().upgrade()
    }

    pub(crate) fn is_owned_by(&self, node: &VNode) -> bool {
        self.owner.borrow().is(node)
    }

    /// Hand the instance over to the node that replaces its previous owner.
    pub(crate) fn adopt(&self, node: &VNode) {
        *self.owner.borrow_mut() = node.downgrade();
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.get()
    }

    pub(crate) fn set_in_flight(&self, in_flight: bool) {
        self.in_flight.set(in_flight);
    }

    /// Remember a request that arrived mid-render.
    pub(crate) fn defer_rerender(&self) {
        self.rerun.set(true);
    }

    /// Clear the in-flight flag. Returns whether a request arrived meanwhile.
    pub(crate) fn end_in_flight(&self) -> bool {
        self.in_flight.set(false);
        self.rerun.replace(false)
    }

    /// Mark as queued. Returns whether it already was.
    pub(crate) fn mark_scheduled(&self) -> bool {
        self.scheduled.replace(true)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub(crate) fn rendered_epoch(&self) -> u64 {
        self.rendered_epoch.get()
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.borrow().len()
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    pub(crate) fn has_pending_effects(&self) -> bool {
        !self.pending_effects.borrow().is_empty()
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Run the component body with this context as the active observer.
    ///
    /// Subscriptions are brought in line with the cells read during this
    /// pass whether or not the body succeeded.
    pub(crate) fn render(self: &Rc<Self>, props: &Props) -> Result<Rendered, RenderError> {
        self.begin_pass();

        let scope = TrackingScope::enter(Observer::Component(self.clone()));
        let outcome = isolate(|| self.component.invoke(props));
        let reads = scope.finish();
        self.sync_subscriptions(&reads);

        let result = match outcome {
            Ok(result) => result.and_then(|rendered| {
                self.check_slot_count()?;
                Ok(rendered)
            }),
            Err(message) => Err(RenderError::Panicked {
                component: self.name(),
                message,
            }),
        };

        match &result {
            Ok(_) => self.rendered_once.set(true),
            Err(_) => self.pending_effects.borrow_mut().clear(),
        }
        result
    }

    /// Reset per-pass state before the body runs.
    pub(crate) fn begin_pass(&self) {
        self.cursor.set(0);
        self.scheduled.set(false);
        self.generation.set(self.generation.get() + 1);
        if let Some(runtime) = self.runtime.upgrade() {
            self.rendered_epoch.set(runtime.scheduler.epoch());
        }
    }

    fn check_slot_count(&self) -> Result<(), HookError> {
        let found = self.cursor.get();
        let expected = self.slot_count();
        if self.rendered_once.get() && self.check_hook_order && found != expected {
            return Err(HookError::SlotCountChanged {
                component: self.name(),
                expected,
                found,
            });
        }
        Ok(())
    }

    fn sync_subscriptions(self: &Rc<Self>, reads: &ReadSet) {
        let mut subscriptions = self.subscriptions.borrow_mut();

        let stale: Vec<CellId> = subscriptions
            .keys()
            .filter(|id| !reads.contains_key(*id))
            .copied()
            .collect();
        for id in stale {
            if let Some(subscription) = subscriptions.shift_remove(&id) {
                subscription.unsubscribe();
            }
        }

        for (id, cell) in reads {
            if subscriptions.contains_key(id) {
                continue;
            }
            match cell.clone().watch(self.rerender_trigger()) {
                Ok(subscription) => {
                    subscriptions.insert(*id, subscription);
                }
                Err(err) => warn!(
                    component = self.name(),
                    cell = id.raw(),
                    %err,
                    "could not subscribe to cell"
                ),
            }
        }
    }

    fn rerender_trigger(self: &Rc<Self>) -> Rc<dyn Fn()> {
        self.rerender
            .get_or_init(|| {
                let weak = Rc::downgrade(self);
                Rc::new(move || {
                    if let Some(context) = weak.upgrade() {
                        context.request_rerender();
                    }
                })
            })
            .clone()
    }

    /// Ask the runtime's scheduler for a re-render.
    pub(crate) fn request_rerender(self: &Rc<Self>) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.scheduler.request(&runtime, self);
        }
    }

    // ------------------------------------------------------------------
    // Hook slots
    // ------------------------------------------------------------------

    /// Claim the next slot index.
    pub(crate) fn next_slot(&self) -> usize {
        let index = self.cursor.get();
        self.cursor.set(index + 1);
        index
    }

    /// Run `f` on slot `index`.
    ///
    /// Returns `Ok(None)` when the slot does not exist yet and may be
    /// created with [`push_slot`](Self::push_slot). `f` must not call back
    /// into user code.
    pub(crate) fn with_slot<S, R>(
        &self,
        index: usize,
        hook: &'static str,
        f: impl FnOnce(&mut S) -> R,
    ) -> Result<Option<R>, HookError>
    where
        S: HookSlot,
    {
        let mut slots = self.slots.borrow_mut();
        let expected = slots.len();
        match slots.get_mut(index) {
            Some(slot) => match slot.as_any_mut().downcast_mut::<S>() {
                Some(slot) => Ok(Some(f(slot))),
                None => {
                    trace!(index, hook, found = type_name::<S>(), "slot type mismatch");
                    Err(HookError::SlotMismatch { index, hook })
                }
            },
            None if self.rendered_once.get() && self.check_hook_order => {
                Err(HookError::SlotCountChanged {
                    component: self.name(),
                    expected,
                    found: index + 1,
                })
            }
            None => Ok(None),
        }
    }

    pub(crate) fn push_slot(&self, index: usize, slot: Box<dyn HookSlot>) {
        let mut slots = self.slots.borrow_mut();
        debug_assert_eq!(slots.len(), index, "hook slots must be created in order");
        slots.push(slot);
    }

    pub(crate) fn queue_effect(&self, effect: PendingEffect) {
        self.pending_effects.borrow_mut().push(effect);
    }

    /// Run the effects queued by the last render, in call order.
    ///
    /// Each effect first runs the cleanup its slot left last time.
    pub(crate) fn run_effects(&self) {
        let pending = std::mem::take(&mut *self.pending_effects.borrow_mut());
        for PendingEffect { slot, run } in pending {
            if !self.mounted.get() {
                break;
            }
            let cleanup = self
                .slots
                .borrow_mut()
                .get_mut(slot)
                .and_then(|slot| slot.take_cleanup());
            if let Some(cleanup) = cleanup {
                if let Err(message) = isolate(cleanup) {
                    error!(component = self.name(), slot, %message, "effect cleanup panicked");
                }
            }

            match isolate(run) {
                Ok(Some(cleanup)) => {
                    if let Some(slot) = self.slots.borrow_mut().get_mut(slot) {
                        slot.set_cleanup(cleanup);
                    }
                }
                Ok(None) => {}
                Err(message) => {
                    error!(component = self.name(), slot, %message, "effect panicked")
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Release everything the instance holds. Idempotent.
    ///
    /// Drops every subscription, runs outstanding effect cleanups once, and
    /// destroys the cells owned by the instance's hooks.
    pub(crate) fn destroy(&self) {
        if !self.mounted.replace(false) {
            return;
        }
        trace!(context = self.id, component = self.name(), "context destroyed");

        let subscriptions = std::mem::take(&mut *self.subscriptions.borrow_mut());
        for (_, subscription) in subscriptions {
            subscription.unsubscribe();
        }
        self.pending_effects.borrow_mut().clear();
        self.scheduled.set(false);
        self.rerun.set(false);

        let slots = std::mem::take(&mut *self.slots.borrow_mut());
        for mut slot in slots {
            if let Some(cleanup) = slot.take_cleanup() {
                if let Err(message) = isolate(cleanup) {
                    error!(component = self.name(), %message, "effect cleanup panicked");
                }
            }
            slot.teardown();
        }
    }
}

impl fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentContext")
            .field("id", &self.id)
            .field("component", &self.name())
            .field("depth", &self.depth)
            .field("slots", &self.slot_count())
            .field("subscriptions", &self.subscription_count())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}
