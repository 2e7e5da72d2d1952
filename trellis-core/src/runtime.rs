//! Rendering Runtime
//!
//! The runtime owns everything a mounted tree needs: the host document, the
//! node-to-context table, the event registry, the re-render scheduler, and
//! the error surface. It is single threaded; background work (coalesced
//! re-renders, deferred components) runs as local tasks, so a runtime must
//! be driven from inside a [`tokio::task::LocalSet`].
//!
//! # Example
//!
//! ```rust,ignore
//! let local = tokio::task::LocalSet::new();
//! local
//!     .run_until(async {
//!         let runtime = Runtime::new(Document::new());
//!         let root = runtime.document().body().clone();
//!         runtime.mount(App, &root, Props::new());
//!         runtime.settle().await;
//!     })
//!     .await;
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use tokio::sync::Notify;
use tracing::{debug, error, trace, warn};

use crate::children;
use crate::component::{Component, ComponentContext, ContextTable};
use crate::config::RuntimeConfig;
use crate::error::RenderError;
use crate::events::EventRegistry;
use crate::host::{Document, HostId, HostNode};
use crate::reactive::Subscription;
use crate::reconcile::Reconciler;
use crate::scheduler::Scheduler;
use crate::vdom::{construct, Props, VNode};

/// Receives render failures.
///
/// The runtime reports every failed component render here after logging
/// it, and clears the surface once a mount completes without failures.
pub trait ErrorSurface {
    fn report_render_error(&self, error: &RenderError);

    fn clear_render_error(&self);
}

/// Default surface: log only.
#[derive(Debug, Default)]
pub struct LogSurface;

impl ErrorSurface for LogSurface {
    fn report_render_error(&self, error: &RenderError) {
        debug!(%error, "render error surfaced");
    }

    fn clear_render_error(&self) {
        trace!("render error cleared");
    }
}

pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) document: Document,
    pub(crate) contexts: RefCell<ContextTable>,
    pub(crate) events: EventRegistry,
    pub(crate) scheduler: Scheduler,
    surface: RefCell<Rc<dyn ErrorSurface>>,
    roots: RefCell<HashMap<HostId, VNode>>,
    commit_queue: RefCell<Vec<Rc<ComponentContext>>>,
    class_bindings: RefCell<HashMap<HostId, Subscription>>,
    errors_reported: Cell<usize>,
    pending: Cell<usize>,
    idle: Notify,
}

/// Decrements the pending-task count when a spawned task ends, however it
/// ends.
struct PendingGuard(Weak<RuntimeInner>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.upgrade() {
            let remaining = runtime.pending.get().saturating_sub(1);
            runtime.pending.set(remaining);
            if remaining == 0 {
                runtime.idle.notify_waiters();
            }
        }
    }
}

impl RuntimeInner {
    /// Run `future` as a local task counted by [`Runtime::settle`].
    pub(crate) fn spawn(self: &Rc<Self>, future: impl Future<Output = ()> + 'static) {
        self.pending.set(self.pending.get() + 1);
        let guard = PendingGuard(Rc::downgrade(self));
        tokio::task::spawn_local(async move {
            let _guard = guard;
            future.await;
        });
    }

    /// Run one scheduler flush.
    pub(crate) fn flush(self: &Rc<Self>) {
        let batch = self.scheduler.take_batch();
        let epoch = self.scheduler.epoch();
        for context in batch {
            if context.rendered_epoch() == epoch {
                trace!(component = context.name(), "skipped: already rendered this flush");
                continue;
            }
            self.rerender(&context);
        }
        self.prune();
    }

    /// Re-render one component in place.
    pub(crate) fn rerender(self: &Rc<Self>, context: &Rc<ComponentContext>) {
        if !context.is_mounted() || context.is_in_flight() {
            return;
        }
        let Some(node) = context.owner() else {
            trace!(component = context.name(), "skipped: owner dropped");
            return;
        };
        let Some(parent) = node.host().and_then(|host| host.parent()) else {
            warn!(component = context.name(), "skipped: component is not attached");
            return;
        };

        context.set_in_flight(true);
        Reconciler::new(self, context.depth()).rerender(&parent, &node, context);
        self.end_pass(context);
        self.run_effects();
    }

    /// Leave an in-flight pass, queueing any request it absorbed.
    pub(crate) fn end_pass(self: &Rc<Self>, context: &Rc<ComponentContext>) {
        if context.end_in_flight() {
            trace!(component = context.name(), "re-queued after in-flight request");
            self.scheduler.request(self, context);
        }
    }

    pub(crate) fn enqueue_commit(&self, context: &Rc<ComponentContext>) {
        if !context.has_pending_effects() {
            return;
        }
        let mut queue = self.commit_queue.borrow_mut();
        if !queue.iter().any(|queued| Rc::ptr_eq(queued, context)) {
            queue.push(context.clone());
        }
    }

    /// Run effects queued by the last commit, children before parents.
    pub(crate) fn run_effects(&self) {
        loop {
            let batch = std::mem::take(&mut *self.commit_queue.borrow_mut());
            if batch.is_empty() {
                break;
            }
            for context in batch {
                context.run_effects();
            }
        }
    }

    /// Log a render failure and forward it to the error surface.
    pub(crate) fn report(&self, component: &str, error: &RenderError) {
        if error.is_hook_violation() {
            error!(component, %error, "hook protocol violated");
        } else {
            error!(component, %error, "render failed");
        }
        self.errors_reported.set(self.errors_reported.get() + 1);
        let surface = self.surface.borrow().clone();
        surface.report_render_error(error);
    }

    /// The inline node that stands in for a failed subtree.
    pub(crate) fn error_node(&self, error: &RenderError) -> VNode {
        construct(
            "div",
            Props::new()
                .with("class", self.config.error_class.as_str())
                .with("role", "alert"),
            children![error.to_string()],
        )
    }

    pub(crate) fn placeholder(&self) -> VNode {
        VNode::text(self.config.placeholder_text.as_str())
    }

    pub(crate) fn bind_class(&self, host: &HostNode, subscription: Subscription) {
        if let Some(previous) = self.class_bindings.borrow_mut().insert(host.id(), subscription) {
            previous.unsubscribe();
        }
    }

    pub(crate) fn unbind_class(&self, host: &HostNode) {
        let previous = self.class_bindings.borrow_mut().remove(&host.id());
        if let Some(previous) = previous {
            previous.unsubscribe();
        }
    }

    /// Detach everything the runtime keeps for an element being unmounted.
    pub(crate) fn release_element(&self, host: &HostNode) {
        self.events.release(host);
        self.unbind_class(host);
    }

    fn prune(&self) {
        let orphans = self.contexts.borrow_mut().prune();
        for context in orphans {
            context.destroy();
        }
    }
}

/// Handle to a rendering runtime. Clones share the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(document: Document) -> Self {
        Self::with_config(document, RuntimeConfig::default())
    }

    pub fn with_config(document: Document, config: RuntimeConfig) -> Self {
        debug!(?config, "runtime created");
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                document,
                contexts: RefCell::new(ContextTable::default()),
                events: EventRegistry::default(),
                scheduler: Scheduler::default(),
                surface: RefCell::new(Rc::new(LogSurface)),
                roots: RefCell::new(HashMap::new()),
                commit_queue: RefCell::new(Vec::new()),
                class_bindings: RefCell::new(HashMap::new()),
                errors_reported: Cell::new(0),
                pending: Cell::new(0),
                idle: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Rc<RuntimeInner> {
        &self.inner
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn set_error_surface(&self, surface: Rc<dyn ErrorSurface>) {
        *self.inner.surface.borrow_mut() = surface;
    }

    /// Render `component` into `root`.
    ///
    /// Mounting onto a root that already holds a tree patches that tree in
    /// place, so a second mount of the same component keeps its state.
    pub fn mount(&self, component: Component, root: &HostNode, props: Props) {
        let runtime = &self.inner;
        let node = construct(component, props, children![]);
        let previous = runtime.roots.borrow().get(&root.id()).cloned();
        debug!(
            component = component.name(),
            root = root.id().raw(),
            remount = previous.is_some(),
            "mount"
        );

        let errors_before = runtime.errors_reported.get();
        Reconciler::new(runtime, 0).patch(root, Some(&node), previous.as_ref());
        runtime.roots.borrow_mut().insert(root.id(), node);
        runtime.run_effects();
        runtime.prune();

        if runtime.errors_reported.get() == errors_before {
            let surface = runtime.surface.borrow().clone();
            surface.clear_render_error();
        }
    }

    /// Tear down the tree mounted at `root`, running every cleanup.
    pub fn unmount(&self, root: &HostNode) {
        let previous = self.inner.roots.borrow_mut().remove(&root.id());
        if let Some(node) = previous {
            debug!(root = root.id().raw(), "unmount");
            Reconciler::new(&self.inner, 0).patch(root, None, Some(&node));
            self.inner.prune();
        }
    }

    /// The tree mounted at `root`, if any.
    pub fn mounted(&self, root: &HostNode) -> Option<VNode> {
        self.inner.roots.borrow().get(&root.id()).cloned()
    }

    /// Make the children of `parent` reflect `new` given that they currently
    /// reflect `old`, then wait for any deferred components to settle.
    pub async fn patch(&self, parent: &HostNode, new: Option<&VNode>, old: Option<&VNode>) {
        Reconciler::new(&self.inner, 0).patch(parent, new, old);
        self.inner.run_effects();
        self.inner.prune();
        self.settle().await;
    }

    /// Wait until no re-render flush or deferred component is outstanding.
    pub async fn settle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.pending.get() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Whether nothing is queued or running.
    pub fn is_idle(&self) -> bool {
        self.inner.pending.get() == 0
    }

    /// Number of live component instances.
    pub fn context_count(&self) -> usize {
        self.inner.contexts.borrow().len()
    }

    /// Number of delegated event handlers.
    pub fn handler_count(&self) -> usize {
        self.inner.events.len()
    }

    /// Number of class attributes bound to signals.
    pub fn class_binding_count(&self) -> usize {
        self.inner.class_bindings.borrow().len()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("contexts", &self.context_count())
            .field("handlers", &self.handler_count())
            .field("pending", &self.inner.pending.get())
            .field("epoch", &self.inner.scheduler.epoch())
            .field("queued", &self.inner.scheduler.queued())
            .field("flush_scheduled", &self.inner.scheduler.is_flush_scheduled())
            .finish()
    }
}
