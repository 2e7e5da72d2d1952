//! Reconciler
//!
//! Makes the host tree under a parent reflect a new virtual tree, given the
//! virtual tree it currently reflects, with as few host mutations as
//! possible.
//!
//! # Cases
//!
//! For a position holding `old` and receiving `new`:
//!
//! 1. nothing on either side: nothing to do
//! 2. only `new`: build it and append it
//! 3. only `old`: remove its host node and unmount it
//! 4. the very same node: nothing to do
//! 5. two text nodes: update the text in place if it differs
//! 6. different kinds, tags, or component functions: build `new`, swap it
//!    in for `old`'s host node, unmount `old`
//! 7. same element tag or fragment: diff properties, then the children
//! 8. same component function: hand the instance to `new` and re-render it
//!    against `old`'s rendered subtree
//!
//! Every virtual node that ends up in the tree knows its host node
//! afterwards; every node that left the tree has been unmounted.

mod build;
mod children;
mod props;

use std::rc::Rc;

use tracing::trace;

use crate::component::{ComponentContext, Rendered};
use crate::host::HostNode;
use crate::runtime::RuntimeInner;
use crate::vdom::{Props, VKind, VNode};

pub(crate) struct Reconciler<'rt> {
    runtime: &'rt Rc<RuntimeInner>,
    /// Depth assigned to components created by this pass.
    depth: usize,
}

impl<'rt> Reconciler<'rt> {
    pub(crate) fn new(runtime: &'rt Rc<RuntimeInner>, depth: usize) -> Self {
        Self { runtime, depth }
    }

    /// Reconciler for the subtree rendered by `context`.
    fn nested(&self, context: &ComponentContext) -> Reconciler<'rt> {
        Reconciler::new(self.runtime, context.depth() + 1)
    }

    pub(crate) fn patch(&self, parent: &HostNode, new: Option<&VNode>, old: Option<&VNode>) {
        match (new, old) {
            (None, None) => {}
            (Some(new), None) => {
                let host = self.build(new);
                parent.append_child(&host);
            }
            (None, Some(old)) => {
                if let Some(host) = old.host() {
                    parent.remove_child(&host);
                }
                self.unmount(old);
            }
            (Some(new), Some(old)) if new.same(old) => {}
            (Some(new), Some(old)) => self.update(parent, new, old),
        }
    }

    fn update(&self, parent: &HostNode, new: &VNode, old: &VNode) {
        if !new.same_type(old) {
            return self.replace(parent, new, old);
        }
        match (new.kind(), old.kind()) {
            (VKind::Text(text), VKind::Text(previous)) => {
                let Some(host) = old.host() else {
                    return self.replace(parent, new, old);
                };
                if text != previous {
                    host.set_text(text);
                }
                new.set_host(Some(host));
            }
            (
                VKind::Element {
                    props, children, ..
                },
                VKind::Element {
                    props: old_props,
                    children: old_children,
                    ..
                },
            ) => {
                let Some(host) = old.host() else {
                    return self.replace(parent, new, old);
                };
                new.set_host(Some(host.clone()));
                props::diff(self.runtime, &host, old_props, props);
                self.patch_children(&host, children, old_children);
            }
            (VKind::Fragment { children }, VKind::Fragment { children: old_children }) => {
                let Some(host) = old.host() else {
                    return self.replace(parent, new, old);
                };
                new.set_host(Some(host.clone()));
                self.patch_children(&host, children, old_children);
            }
            (VKind::Component { props, .. }, VKind::Component { .. }) => {
                self.update_component(parent, new, old, props)
            }
            _ => self.replace(parent, new, old),
        }
    }

    fn replace(&self, parent: &HostNode, new: &VNode, old: &VNode) {
        let host = self.build(new);
        match old.host() {
            Some(previous) if parent.replace_child(&host, &previous) => {}
            _ => parent.append_child(&host),
        }
        self.unmount(old);
    }

    fn update_component(&self, parent: &HostNode, new: &VNode, old: &VNode, props: &Props) {
        let transferred = self.runtime.contexts.borrow_mut().transfer(old, new);
        let Some(context) = transferred else {
            trace!("component was never mounted; building fresh");
            return self.replace(parent, new, old);
        };
        let previous = old.rendered();
        old.set_rendered(None);
        self.render_into(parent, new, &context, props, previous);
    }

    /// Re-render the instance owned by `node` in place.
    pub(crate) fn rerender(&self, parent: &HostNode, node: &VNode, context: &Rc<ComponentContext>) {
        let Some(props) = node.props() else {
            return;
        };
        let previous = node.rendered();
        self.render_into(parent, node, context, props, previous);
    }

    /// Run the body of `context` and patch its output over `previous`.
    ///
    /// A deferred body keeps `previous` on screen until its result arrives;
    /// a failed body is replaced by the inline error node.
    fn render_into(
        &self,
        parent: &HostNode,
        node: &VNode,
        context: &Rc<ComponentContext>,
        props: &Props,
        previous: Option<VNode>,
    ) {
        let tree = match context.render(props) {
            Ok(Rendered::Ready(tree)) => tree,
            Ok(Rendered::Pending(future)) => {
                node.set_rendered(previous);
                self.settle_deferred(node, context, future);
                self.runtime.enqueue_commit(context);
                return;
            }
            Err(err) => {
                self.runtime.report(context.name(), &err);
                self.runtime.error_node(&err)
            }
        };
        self.nested(context).patch(parent, Some(&tree), previous.as_ref());
        node.set_rendered(Some(tree));
        self.runtime.enqueue_commit(context);
    }

    /// Release everything `node` and its subtree hold: contexts, delegated
    /// handlers, class bindings, host back-references.
    pub(crate) fn unmount(&self, node: &VNode) {
        match node.kind() {
            VKind::Component { .. } => {
                let removed = self.runtime.contexts.borrow_mut().remove(node);
                if let Some(context) = removed {
                    context.destroy();
                }
                if let Some(rendered) = node.rendered() {
                    self.unmount(&rendered);
                }
                node.set_rendered(None);
            }
            VKind::Element { children, .. } => {
                if let Some(host) = node.host() {
                    self.runtime.release_element(&host);
                }
                for child in children {
                    self.unmount(child);
                }
                node.set_host(None);
            }
            VKind::Fragment { children } => {
                for child in children {
                    self.unmount(child);
                }
                node.set_host(None);
            }
            VKind::Text(_) => node.set_host(None),
        }
    }
}
