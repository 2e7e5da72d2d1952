//! Virtual Nodes
//!
//! A virtual node describes one piece of the host tree. After construction
//! or patching it also remembers the host node it was realized as, and a
//! component node remembers the subtree its body produced.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{Key, Props};
use crate::component::Component;
use crate::host::HostNode;

/// The closed set of node kinds.
pub enum VKind {
    Element {
        tag: String,
        props: Props,
        children: Vec<VNode>,
    },
    Component {
        component: Component,
        props: Props,
    },
    Fragment {
        children: Vec<VNode>,
    },
    Text(String),
}

pub(crate) struct VNodeData {
    kind: VKind,
    key: Option<Key>,
    host: RefCell<Option<HostNode>>,
    rendered: RefCell<Option<VNode>>,
}

/// Shared handle to a virtual node. Clones refer to the same node.
#[derive(Clone)]
pub struct VNode(Rc<VNodeData>);

impl VNode {
    pub(crate) fn from_kind(kind: VKind, key: Option<Key>) -> Self {
        Self(Rc::new(VNodeData {
            kind,
            key,
            host: RefCell::new(None),
            rendered: RefCell::new(None),
        }))
    }

    /// A text node.
    pub fn text(value: impl Into<String>) -> Self {
        Self::from_kind(VKind::Text(value.into()), None)
    }

    pub fn kind(&self) -> &VKind {
        &self.0.kind
    }

    pub fn key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    /// Tag for element nodes.
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            VKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Text for text nodes.
    pub fn as_text(&self) -> Option<&str> {
        match &self.0.kind {
            VKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Child list of element and fragment nodes.
    pub fn children(&self) -> &[VNode] {
        match &self.0.kind {
            VKind::Element { children, .. } | VKind::Fragment { children } => children,
            VKind::Component { props, .. } => props.children(),
            VKind::Text(_) => &[],
        }
    }

    pub fn props(&self) -> Option<&Props> {
        match &self.0.kind {
            VKind::Element { props, .. } | VKind::Component { props, .. } => Some(props),
            _ => None,
        }
    }

    pub fn component(&self) -> Option<&Component> {
        match &self.0.kind {
            VKind::Component { component, .. } => Some(component),
            _ => None,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self.0.kind, VKind::Component { .. })
    }

    /// Whether both nodes can be patched in place: same kind and, for
    /// elements and components, the same tag or component function.
    pub fn same_type(&self, other: &VNode) -> bool {
        match (&self.0.kind, &other.0.kind) {
            (VKind::Text(_), VKind::Text(_)) => true,
            (VKind::Fragment { .. }, VKind::Fragment { .. }) => true,
            (VKind::Element { tag: a, .. }, VKind::Element { tag: b, .. }) => a == b,
            (VKind::Component { component: a, .. }, VKind::Component { component: b, .. }) => a == b,
            _ => false,
        }
    }

    /// The realized host node.
    ///
    /// A component has no host node of its own; this resolves through its
    /// rendered subtree, so it stays correct after that subtree is swapped.
    pub fn host(&self) -> Option<HostNode> {
        match self.0.kind {
            VKind::Component { .. } => self.rendered().and_then(|rendered| rendered.host()),
            _ => self.0.host.borrow().clone(),
        }
    }

    pub(crate) fn set_host(&self, host: Option<HostNode>) {
        *self.0.host.borrow_mut() = host;
    }

    /// The subtree a component node last rendered.
    pub fn rendered(&self) -> Option<VNode> {
        self.0.rendered.borrow().clone()
    }

    pub(crate) fn set_rendered(&self, rendered: Option<VNode>) {
        *self.0.rendered.borrow_mut() = rendered;
    }

    /// Whether two handles refer to the same node.
    pub fn same(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address-based identity, used to key the node→context table.
    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub(crate) fn downgrade(&self) -> WeakVNode {
        WeakVNode(Rc::downgrade(&self.0))
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            VKind::Text(text) => write!(f, "Text({text:?})"),
            VKind::Element { tag, props, children } => f
                .debug_struct("Element")
                .field("tag", tag)
                .field("key", &self.0.key)
                .field("props", props)
                .field("children", children)
                .finish(),
            VKind::Component { component, props } => f
                .debug_struct("Component")
                .field("name", &component.name())
                .field("key", &self.0.key)
                .field("props", props)
                .finish(),
            VKind::Fragment { children } => f.debug_tuple("Fragment").field(children).finish(),
        }
    }
}

/// Weak handle to a virtual node.
#[derive(Clone, Default)]
pub(crate) struct WeakVNode(Weak<VNodeData>);

impl WeakVNode {
    pub(crate) fn upgrade(&self) -> Option<VNode> {
        self.0.upgrade().map(VNode)
    }

    pub(crate) fn is(&self, node: &VNode) -> bool {
        self.0.as_ptr() == Rc::as_ptr(&node.0)
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
