//! Event Delegation
//!
//! Handlers are never attached to the elements that declare them. Instead
//! each element with a handler gets a delegate id, the handler is filed
//! under `(kind, id)`, and the document root carries exactly one listener
//! per event kind. Dispatch walks from the event target toward the root and
//! invokes the first handler it finds.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{error, trace};

use crate::error::isolate;
use crate::host::{Event, HostNode};
use crate::runtime::RuntimeInner;
use crate::vdom::EventHandler;

#[derive(Default)]
pub(crate) struct EventRegistry {
    next_id: Cell<u64>,
    handlers: RefCell<HashMap<String, HashMap<u64, EventHandler>>>,
}

impl EventRegistry {
    /// File `handler` for `kind` on `host`, attaching the root listener for
    /// `kind` the first time it is seen.
    pub(crate) fn register(
        &self,
        runtime: &Rc<RuntimeInner>,
        host: &HostNode,
        kind: &str,
        handler: EventHandler,
    ) {
        let id = host.delegate_id().unwrap_or_else(|| {
            let id = self.next_id.get() + 1;
            self.next_id.set(id);
            host.set_delegate_id(id);
            id
        });
        self.handlers
            .borrow_mut()
            .entry(kind.to_string())
            .or_default()
            .insert(id, handler);

        if !runtime.document.has_listener(kind) {
            let weak = Rc::downgrade(runtime);
            runtime.document.listen(
                kind,
                Rc::new(move |event: &Event| {
                    if let Some(runtime) = weak.upgrade() {
                        runtime.events.dispatch(event);
                    }
                }),
            );
        }
    }

    pub(crate) fn unregister(&self, host: &HostNode, kind: &str) {
        let Some(id) = host.delegate_id() else {
            return;
        };
        if let Some(by_node) = self.handlers.borrow_mut().get_mut(kind) {
            by_node.remove(&id);
        }
    }

    /// Drop every handler filed for `host`.
    pub(crate) fn release(&self, host: &HostNode) {
        let Some(id) = host.delegate_id() else {
            return;
        };
        for by_node in self.handlers.borrow_mut().values_mut() {
            by_node.remove(&id);
        }
    }

    /// Deliver `event` to the nearest handler at or above its target.
    /// Returns whether a handler ran.
    pub(crate) fn dispatch(&self, event: &Event) -> bool {
        let mut current = Some(event.target().clone());
        while let Some(node) = current {
            if let Some(id) = node.delegate_id() {
                let handler = self
                    .handlers
                    .borrow()
                    .get(event.kind())
                    .and_then(|by_node| by_node.get(&id))
                    .cloned();
                if let Some(handler) = handler {
                    trace!(kind = event.kind(), node = node.id().raw(), "dispatching event");
                    if let Err(message) = isolate(|| handler(event)) {
                        error!(kind = event.kind(), %message, "event handler panicked");
                    }
                    return true;
                }
            }
            current = node.parent();
        }
        false
    }

    /// Number of registered handlers across all kinds.
    pub(crate) fn len(&self) -> usize {
        self.handlers.borrow().values().map(HashMap::len).sum()
    }
}
