//! Host construction and deferred components.

use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use tracing::{debug, trace, warn};

use super::{props, Reconciler};
use crate::component::{Component, ComponentContext, RenderResult, Rendered};
use crate::host::HostNode;
use crate::vdom::{Props, VKind, VNode};

impl Reconciler<'_> {
    /// Create the host subtree for `node`, recording the host node on every
    /// virtual node along the way. The result is not attached anywhere.
    pub(crate) fn build(&self, node: &VNode) -> HostNode {
        let document = &self.runtime.document;
        match node.kind() {
            VKind::Text(text) => {
                let host = document.create_text(text);
                node.set_host(Some(host.clone()));
                host
            }
            VKind::Element {
                tag,
                props,
                children,
            } => {
                let host = document.create_element(tag);
                props::apply_all(self.runtime, &host, props);
                for child in children {
                    host.append_child(&self.build(child));
                }
                node.set_host(Some(host.clone()));
                host
            }
            VKind::Fragment { children } => {
                let host = document.create_fragment();
                for child in children {
                    host.append_child(&self.build(child));
                }
                node.set_host(Some(host.clone()));
                host
            }
            VKind::Component { component, props } => self.build_component(node, component, props),
        }
    }

    fn build_component(&self, node: &VNode, component: &Component, props: &Props) -> HostNode {
        let runtime = self.runtime;
        let context = ComponentContext::new(
            Rc::downgrade(runtime),
            *component,
            node,
            self.depth,
            runtime.config.check_hook_order,
        );
        runtime.contexts.borrow_mut().insert(node, context.clone());

        let (tree, deferred) = match context.render(props) {
            Ok(Rendered::Ready(tree)) => (tree, None),
            Ok(Rendered::Pending(future)) => (runtime.placeholder(), Some(future)),
            Err(err) => {
                runtime.report(context.name(), &err);
                (runtime.error_node(&err), None)
            }
        };

        let host = self.nested(&context).build(&tree);
        node.set_rendered(Some(tree));
        if let Some(future) = deferred {
            self.settle_deferred(node, &context, future);
        }
        runtime.enqueue_commit(&context);
        host
    }

    /// Await a deferred body on a local task and patch its result over
    /// whatever the component shows meanwhile.
    ///
    /// The result is dropped if the instance unmounted, moved to another
    /// node, or rendered again while the future was pending.
    pub(super) fn settle_deferred(
        &self,
        node: &VNode,
        context: &Rc<ComponentContext>,
        future: LocalBoxFuture<'static, RenderResult>,
    ) {
        let runtime = self.runtime.clone();
        let generation = context.generation();
        let weak_node = node.downgrade();
        let weak_context = Rc::downgrade(context);
        debug!(component = context.name(), generation, "awaiting deferred component");

        self.runtime.spawn(async move {
            let outcome = future.await;
            let (Some(context), Some(node)) = (weak_context.upgrade(), weak_node.upgrade()) else {
                return;
            };
            if !context.is_mounted()
                || context.generation() != generation
                || !context.is_owned_by(&node)
            {
                trace!(component = context.name(), generation, "stale deferred result dropped");
                return;
            }

            let tree = match outcome {
                Ok(tree) => tree,
                Err(err) => {
                    runtime.report(context.name(), &err);
                    runtime.error_node(&err)
                }
            };
            let previous = node.rendered();
            let Some(parent) = previous
                .as_ref()
                .and_then(VNode::host)
                .and_then(|host| host.parent())
            else {
                warn!(component = context.name(), "deferred component is no longer attached");
                return;
            };

            debug!(component = context.name(), generation, "deferred component settled");
            context.set_in_flight(true);
            Reconciler::new(&runtime, context.depth() + 1).patch(
                &parent,
                Some(&tree),
                previous.as_ref(),
            );
            node.set_rendered(Some(tree));
            runtime.end_pass(&context);
            runtime.run_effects();
        });
    }
}
