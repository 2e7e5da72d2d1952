//! Virtual Tree
//!
//! In-memory description of the host tree. Trees are built with
//! [`construct`] (also exported as `h`), which is the only entry point a
//! markup transformer needs to target:
//!
//! ```rust
//! use trellis_core::{children, h, Props};
//!
//! let list = h(
//!     "ul",
//!     Props::new().with("class", "todo"),
//!     children![
//!         h("li", Props::new().key(1), children!["write"]),
//!         h("li", Props::new().key(2), children!["review"]),
//!     ],
//! );
//! assert_eq!(list.children().len(), 2);
//! ```

mod node;
mod props;

use std::fmt;
use std::rc::Rc;

use crate::component::Component;

pub use node::{VKind, VNode};
pub use props::{EventHandler, PropValue, Props};

pub(crate) use node::WeakVNode;

/// Explicit identity of a child within its list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(Rc<str>),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{i}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Int(value as i64)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.into())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value.into())
    }
}

/// The `type` argument of [`construct`].
#[derive(Clone)]
pub enum NodeType {
    Tag(String),
    Component(Component),
    Fragment,
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        NodeType::Tag(tag.to_string())
    }
}

impl From<String> for NodeType {
    fn from(tag: String) -> Self {
        NodeType::Tag(tag)
    }
}

impl From<Component> for NodeType {
    fn from(component: Component) -> Self {
        NodeType::Component(component)
    }
}

/// Anything accepted in a child list.
///
/// Strings and numbers become text nodes; `bool` and `None` render nothing;
/// vectors are spliced in place.
pub enum Child {
    Node(VNode),
    Many(Vec<VNode>),
    Empty,
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<Vec<VNode>> for Child {
    fn from(nodes: Vec<VNode>) -> Self {
        Child::Many(nodes)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Node(VNode::text(text))
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Node(VNode::text(text))
    }
}

impl From<&String> for Child {
    fn from(text: &String) -> Self {
        Child::Node(VNode::text(text.as_str()))
    }
}

macro_rules! numeric_child {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Child {
            fn from(value: $ty) -> Self {
                Child::Node(VNode::text(value.to_string()))
            }
        })*
    };
}

numeric_child!(i32, i64, u32, u64, usize, f64);

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Empty
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Child::Empty, Into::into)
    }
}

/// Build a child list from heterogeneous values.
#[macro_export]
macro_rules! children {
    () => {
        ::std::vec::Vec::<$crate::vdom::Child>::new()
    };
    ($($child:expr),+ $(,)?) => {
        ::std::vec![$($crate::vdom::Child::from($child)),+]
    };
}

/// The tree-construction primitive.
///
/// `ty` is a tag name, a [`Component`], or [`NodeType::Fragment`]. The
/// `key` of `props` becomes the node's ordering key; for components the
/// children are handed to the body through [`Props::children`].
pub fn construct(
    ty: impl Into<NodeType>,
    mut props: Props,
    children: impl IntoIterator<Item = Child>,
) -> VNode {
    let key = props.take_key();
    let mut nodes = Vec::new();
    for child in children {
        match child {
            Child::Node(node) => nodes.push(node),
            Child::Many(many) => nodes.extend(many),
            Child::Empty => {}
        }
    }

    let kind = match ty.into() {
        NodeType::Tag(tag) => VKind::Element {
            tag,
            props,
            children: nodes,
        },
        NodeType::Component(component) => {
            props.set_children(nodes);
            VKind::Component { component, props }
        }
        NodeType::Fragment => VKind::Fragment { children: nodes },
    };
    VNode::from_kind(kind, key)
}

/// A fragment of `children`.
pub fn fragment(children: impl IntoIterator<Item = Child>) -> VNode {
    construct(NodeType::Fragment, Props::new(), children)
}
