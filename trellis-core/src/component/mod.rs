//! Components
//!
//! A component is a plain function from [`Props`] to a virtual subtree. Each
//! mounted instance gets a [`ComponentContext`] that holds its hook state
//! and the cells it subscribed to; the context survives re-renders for as
//! long as the reconciler sees the same component function in the same
//! place.
//!
//! Components come in two flavors:
//!
//! - [`Component::new`]: the body returns the subtree directly.
//! - [`Component::deferred`]: the body returns a future. A placeholder is
//!   shown until it settles.
//!
//! Hooks must be called from the synchronous part of the body.

mod context;
mod hooks;
mod table;

use std::fmt;

use futures_util::future::LocalBoxFuture;

use crate::error::RenderError;
use crate::vdom::{Props, VNode};

pub use hooks::{
    use_callback, use_derived, use_effect, use_memo, use_ref, use_state, Cleanup, HookRef,
};

pub(crate) use context::ComponentContext;
pub(crate) use table::ContextTable;

/// Result of a component body.
pub type RenderResult = Result<VNode, RenderError>;

/// Body of a synchronous component.
pub type RenderFn = fn(&Props) -> RenderResult;

/// Body of an asynchronous component.
pub type DeferredRenderFn = fn(&Props) -> LocalBoxFuture<'static, RenderResult>;

#[derive(Clone, Copy)]
enum Body {
    Immediate(RenderFn),
    Deferred(DeferredRenderFn),
}

/// What a component body produced.
pub(crate) enum Rendered {
    Ready(VNode),
    Pending(LocalBoxFuture<'static, RenderResult>),
}

/// A component type: a named render function.
///
/// Two components are the same type when they wrap the same function, which
/// is what lets the reconciler keep an instance alive across patches.
#[derive(Clone, Copy)]
pub struct Component {
    name: &'static str,
    body: Body,
}

impl Component {
    pub const fn new(name: &'static str, body: RenderFn) -> Self {
        Self {
            name,
            body: Body::Immediate(body),
        }
    }

    pub const fn deferred(name: &'static str, body: DeferredRenderFn) -> Self {
        Self {
            name,
            body: Body::Deferred(body),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self.body, Body::Deferred(_))
    }

    fn address(&self) -> usize {
        match self.body {
            Body::Immediate(f) => f as usize,
            Body::Deferred(f) => f as usize,
        }
    }

    pub(crate) fn invoke(&self, props: &Props) -> Result<Rendered, RenderError> {
        match self.body {
            Body::Immediate(body) => body(props).map(Rendered::Ready),
            Body::Deferred(body) => Ok(Rendered::Pending(body(props))),
        }
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.is_deferred() == other.is_deferred() && self.address() == other.address()
    }
}

impl Eq for Component {}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("deferred", &self.is_deferred())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::children;
    use crate::vdom::construct;

    fn first(_: &Props) -> RenderResult {
        Ok(construct("p", Props::new(), children!["first"]))
    }

    fn second(_: &Props) -> RenderResult {
        Ok(construct("p", Props::new(), children!["second"]))
    }

    #[test]
    fn identity_follows_the_function() {
        assert_eq!(Component::new("First", first), Component::new("Renamed", first));
        assert_ne!(Component::new("First", first), Component::new("Second", second));
    }

    #[test]
    fn immediate_body_is_ready() {
        let rendered = Component::new("First", first).invoke(&Props::new()).unwrap();
        match rendered {
            Rendered::Ready(node) => assert_eq!(node.tag(), Some("p")),
            Rendered::Pending(_) => panic!("expected an immediate result"),
        }
    }
}
