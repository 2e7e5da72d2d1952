//! Host Element Tree
//!
//! An in-memory document the reconciler patches. It offers exactly what the
//! engine needs from a host: create nodes, insert/move/remove/replace them,
//! set attributes, properties and style, attach one listener per event kind
//! at the root, dispatch events, and locate nodes.
//!
//! The document counts every structural mutation in [`MutationStats`] so
//! callers can verify that a patch touched only what it had to.

mod node;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::trace;

pub use node::{HostId, HostKind, HostNode, HostValue};

/// Counters of host-tree mutations since creation or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutationStats {
    /// Nodes created (elements, text nodes, fragments).
    pub created: usize,
    /// Nodes attached under a new parent.
    pub inserted: usize,
    /// Nodes detached from their parent.
    pub removed: usize,
    /// Nodes repositioned under the same parent.
    pub moved: usize,
    /// Nodes swapped in place for another node.
    pub replaced: usize,
    /// Text node value changes.
    pub text_updates: usize,
    /// Attribute sets and removals.
    pub attribute_writes: usize,
}

/// An event delivered through a root listener.
#[derive(Debug, Clone)]
pub struct Event {
    kind: String,
    target: HostNode,
}

impl Event {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The node the event originated at.
    pub fn target(&self) -> &HostNode {
        &self.target
    }
}

/// Listener attached at the document root.
pub type RootListener = Rc<dyn Fn(&Event)>;

pub(crate) struct DocumentInner {
    next_id: Cell<u64>,
    pub(crate) stats: RefCell<MutationStats>,
    listeners: RefCell<IndexMap<String, RootListener>>,
}

/// The host document: a root element plus the root-level listeners.
#[derive(Clone)]
pub struct Document {
    inner: Rc<DocumentInner>,
    body: HostNode,
}

impl Document {
    /// Create an empty document with a `body` root element.
    pub fn new() -> Self {
        let inner = Rc::new(DocumentInner {
            next_id: Cell::new(0),
            stats: RefCell::new(MutationStats::default()),
            listeners: RefCell::new(IndexMap::new()),
        });
        let body = HostNode::new(&inner, HostId(0), HostKind::Element("body".into()), String::new());
        inner.next_id.set(1);
        Self { inner, body }
    }

    /// The root element. Listeners are attached here.
    pub fn body(&self) -> &HostNode {
        &self.body
    }

    fn next_id(&self) -> HostId {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        HostId(id)
    }

    fn create(&self, kind: HostKind, text: String) -> HostNode {
        self.inner.stats.borrow_mut().created += 1;
        HostNode::new(&self.inner, self.next_id(), kind, text)
    }

    pub fn create_element(&self, tag: &str) -> HostNode {
        self.create(HostKind::Element(tag.to_string()), String::new())
    }

    pub fn create_text(&self, text: &str) -> HostNode {
        self.create(HostKind::Text, text.to_string())
    }

    pub fn create_fragment(&self) -> HostNode {
        self.create(HostKind::Fragment, String::new())
    }

    /// Attach the root listener for `kind`. Returns false if one exists.
    pub fn listen(&self, kind: &str, listener: RootListener) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        if listeners.contains_key(kind) {
            return false;
        }
        trace!(kind, "root listener attached");
        listeners.insert(kind.to_string(), listener);
        true
    }

    pub fn has_listener(&self, kind: &str) -> bool {
        self.inner.listeners.borrow().contains_key(kind)
    }

    /// Number of root listeners across all event kinds.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Fire an event of `kind` at `target`. Returns false when no root
    /// listener exists for that kind.
    pub fn dispatch(&self, kind: &str, target: &HostNode) -> bool {
        let listener = self.inner.listeners.borrow().get(kind).cloned();
        let Some(listener) = listener else {
            return false;
        };
        listener(&Event {
            kind: kind.to_string(),
            target: target.clone(),
        });
        true
    }

    pub fn stats(&self) -> MutationStats {
        *self.inner.stats.borrow()
    }

    pub fn reset_stats(&self) {
        *self.inner.stats.borrow_mut() = MutationStats::default();
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("body", &self.body)
            .field("listeners", &self.listener_count())
            .field("stats", &self.stats())
            .finish()
    }
}
