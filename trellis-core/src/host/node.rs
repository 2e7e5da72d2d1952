//! Host Nodes
//!
//! A host node is one realized element, text run, or grouping container in
//! the document. Nodes are reference counted; a child holds a weak pointer
//! to its parent, a parent holds its children strongly.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use super::{DocumentInner, MutationStats};

/// Unique identifier for a host node within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(pub(crate) u64);

impl HostId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// What a host node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKind {
    Element(String),
    Text,
    /// A grouping container. Serializes as its children only.
    Fragment,
}

/// A value assigned as a host *property* rather than an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

pub(crate) struct HostNodeData {
    id: HostId,
    kind: HostKind,
    text: RefCell<String>,
    attributes: RefCell<IndexMap<String, String>>,
    properties: RefCell<IndexMap<String, HostValue>>,
    style: RefCell<IndexMap<String, String>>,
    children: RefCell<Vec<HostNode>>,
    parent: RefCell<Weak<HostNodeData>>,
    delegate_id: Cell<Option<u64>>,
    document: Weak<DocumentInner>,
}

/// Handle to a node in the host tree.
#[derive(Clone)]
pub struct HostNode(Rc<HostNodeData>);

impl HostNode {
    pub(crate) fn new(document: &Rc<DocumentInner>, id: HostId, kind: HostKind, text: String) -> Self {
        Self(Rc::new(HostNodeData {
            id,
            kind,
            text: RefCell::new(text),
            attributes: RefCell::new(IndexMap::new()),
            properties: RefCell::new(IndexMap::new()),
            style: RefCell::new(IndexMap::new()),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            delegate_id: Cell::new(None),
            document: Rc::downgrade(document),
        }))
    }

    pub fn id(&self) -> HostId {
        self.0.id
    }

    pub fn kind(&self) -> &HostKind {
        &self.0.kind
    }

    /// Tag name for elements.
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            HostKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.0.kind == HostKind::Text
    }

    /// Whether two handles point at the same node.
    pub fn same(&self, other: &HostNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakHostNode {
        WeakHostNode(Rc::downgrade(&self.0))
    }

    fn record(&self, f: impl FnOnce(&mut MutationStats)) {
        if let Some(document) = self.0.document.upgrade() {
            f(&mut document.stats.borrow_mut());
        }
    }

    // ------------------------------------------------------------------
    // Tree structure
    // ------------------------------------------------------------------

    pub fn parent(&self) -> Option<HostNode> {
        self.0.parent.borrow().upgrade().map(HostNode)
    }

    pub fn children(&self) -> Vec<HostNode> {
        self.0.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    pub fn child_at(&self, index: usize) -> Option<HostNode> {
        self.0.children.borrow().get(index).cloned()
    }

    pub fn index_of(&self, child: &HostNode) -> Option<usize> {
        self.0
            .children
            .borrow()
            .iter()
            .position(|node| node.same(child))
    }

    /// Append `child`, detaching it from any previous parent.
    pub fn append_child(&self, child: &HostNode) {
        let len = self.child_count();
        self.insert_at(len, child);
    }

    /// Place `child` at `index` (clamped). A child already under this node
    /// is moved; anything else is inserted.
    pub fn insert_at(&self, index: usize, child: &HostNode) {
        if let Some(current) = self.index_of(child) {
            if current == index {
                return;
            }
            let mut children = self.0.children.borrow_mut();
            let node = children.remove(current);
            let index = index.min(children.len());
            children.insert(index, node);
            drop(children);
            self.record(|stats| stats.moved += 1);
            return;
        }

        child.detach();
        let mut children = self.0.children.borrow_mut();
        let index = index.min(children.len());
        children.insert(index, child.clone());
        drop(children);
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.record(|stats| stats.inserted += 1);
    }

    /// Remove `child`. Returns false if it was not a child of this node.
    pub fn remove_child(&self, child: &HostNode) -> bool {
        let Some(index) = self.index_of(child) else {
            return false;
        };
        self.0.children.borrow_mut().remove(index);
        *child.0.parent.borrow_mut() = Weak::new();
        self.record(|stats| stats.removed += 1);
        true
    }

    /// Put `new` where `old` is. Returns false if `old` is not a child.
    pub fn replace_child(&self, new: &HostNode, old: &HostNode) -> bool {
        if self.index_of(old).is_none() {
            return false;
        }
        new.detach();
        let Some(index) = self.index_of(old) else {
            return false;
        };
        self.0.children.borrow_mut()[index] = new.clone();
        *old.0.parent.borrow_mut() = Weak::new();
        *new.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.record(|stats| stats.replaced += 1);
        true
    }

    fn detach(&self) {
        if let Some(parent) = self.parent() {
            if let Some(index) = parent.index_of(self) {
                parent.0.children.borrow_mut().remove(index);
            }
        }
        *self.0.parent.borrow_mut() = Weak::new();
    }

    /// Whether `ancestor` is this node or one of its ancestors.
    pub fn is_within(&self, ancestor: &HostNode) -> bool {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if node.same(ancestor) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    // ------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------

    /// Text of a text node, or the concatenated text of all descendants.
    pub fn text(&self) -> String {
        match self.0.kind {
            HostKind::Text => self.0.text.borrow().clone(),
            _ => self.0.children.borrow().iter().map(HostNode::text).collect(),
        }
    }

    pub(crate) fn set_text(&self, value: &str) {
        let mut text = self.0.text.borrow_mut();
        if *text != value {
            *text = value.to_string();
            drop(text);
            self.record(|stats| stats.text_updates += 1);
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.attributes.borrow().get(name).cloned()
    }

    pub fn attributes(&self) -> IndexMap<String, String> {
        self.0.attributes.borrow().clone()
    }

    pub(crate) fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        self.record(|stats| stats.attribute_writes += 1);
    }

    pub(crate) fn remove_attribute(&self, name: &str) {
        if self.0.attributes.borrow_mut().shift_remove(name).is_some() {
            self.record(|stats| stats.attribute_writes += 1);
        }
    }

    pub fn property(&self, name: &str) -> Option<HostValue> {
        self.0.properties.borrow().get(name).cloned()
    }

    pub(crate) fn set_property(&self, name: &str, value: HostValue) {
        self.0.properties.borrow_mut().insert(name.to_string(), value);
    }

    pub(crate) fn remove_property(&self, name: &str) {
        self.0.properties.borrow_mut().shift_remove(name);
    }

    pub fn style(&self, name: &str) -> Option<String> {
        self.0.style.borrow().get(name).cloned()
    }

    pub(crate) fn set_style(&self, name: &str, value: &str) {
        self.0
            .style
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    /// Keep only the style properties for which `keep` holds.
    pub(crate) fn retain_style(&self, keep: impl Fn(&str) -> bool) {
        self.0.style.borrow_mut().retain(|name, _| keep(name));
    }

    pub(crate) fn delegate_id(&self) -> Option<u64> {
        self.0.delegate_id.get()
    }

    pub(crate) fn set_delegate_id(&self, id: u64) {
        self.0.delegate_id.set(Some(id));
    }

    // ------------------------------------------------------------------
    // Lookup and serialization
    // ------------------------------------------------------------------

    /// Depth-first search including this node.
    pub fn find(&self, predicate: &dyn Fn(&HostNode) -> bool) -> Option<HostNode> {
        if predicate(self) {
            return Some(self.clone());
        }
        self.0
            .children
            .borrow()
            .iter()
            .find_map(|child| child.find(predicate))
    }

    /// First element with the given tag.
    pub fn find_by_tag(&self, tag: &str) -> Option<HostNode> {
        self.find(&|node| node.tag() == Some(tag))
    }

    /// Every element with the given tag, in document order.
    pub fn find_all_by_tag(&self, tag: &str) -> Vec<HostNode> {
        let mut found = Vec::new();
        self.collect(tag, &mut found);
        found
    }

    fn collect(&self, tag: &str, found: &mut Vec<HostNode>) {
        if self.tag() == Some(tag) {
            found.push(self.clone());
        }
        for child in self.0.children.borrow().iter() {
            child.collect(tag, found);
        }
    }

    /// Serialize the subtree as HTML. Text and attribute values are escaped.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    /// Serialize the children of this node as HTML.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.0.children.borrow().iter() {
            child.write_html(&mut out);
        }
        out
    }

    fn write_html(&self, out: &mut String) {
        match &self.0.kind {
            HostKind::Text => out.push_str(&escape(&self.0.text.borrow())),
            HostKind::Fragment => {
                for child in self.0.children.borrow().iter() {
                    child.write_html(out);
                }
            }
            HostKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in self.0.attributes.borrow().iter() {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape(value));
                        out.push('"');
                    }
                }
                let style = self.0.style.borrow();
                if !style.is_empty() {
                    let rules: Vec<String> =
                        style.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                    out.push_str(" style=\"");
                    out.push_str(&escape(&rules.join("; ")));
                    out.push('"');
                }
                out.push('>');
                for child in self.0.children.borrow().iter() {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// Structured snapshot of the subtree, handy for assertions.
    pub fn to_json(&self) -> Value {
        match &self.0.kind {
            HostKind::Text => json!({ "text": self.0.text.borrow().clone() }),
            HostKind::Fragment => json!({
                "fragment": self.0.children.borrow().iter().map(HostNode::to_json).collect::<Vec<_>>(),
            }),
            HostKind::Element(tag) => json!({
                "tag": tag,
                "attributes": self
                    .0
                    .attributes
                    .borrow()
                    .iter()
                    .map(|(name, value)| (name.clone(), Value::String(value.clone())))
                    .collect::<Map<String, Value>>(),
                "children": self.0.children.borrow().iter().map(HostNode::to_json).collect::<Vec<_>>(),
            }),
        }
    }
}

impl fmt::Debug for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostNode")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .field("children", &self.child_count())
            .finish()
    }
}

/// Weak handle to a host node, for bindings that must not keep it alive.
#[derive(Clone)]
pub(crate) struct WeakHostNode(Weak<HostNodeData>);

impl WeakHostNode {
    pub(crate) fn upgrade(&self) -> Option<HostNode> {
        self.0.upgrade().map(HostNode)
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
