//! Node-to-context table.
//!
//! Keyed by the identity of the component node that currently owns each
//! context. Entries hold the node weakly, so a lookup with a recycled
//! address never finds a stale context.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use super::ComponentContext;
use crate::vdom::{VNode, WeakVNode};

struct Entry {
    node: WeakVNode,
    context: Rc<ComponentContext>,
}

#[derive(Default)]
pub(crate) struct ContextTable {
    entries: HashMap<usize, Entry>,
}

impl ContextTable {
    pub(crate) fn insert(&mut self, node: &VNode, context: Rc<ComponentContext>) {
        self.entries.insert(
            node.identity(),
            Entry {
                node: node.downgrade(),
                context,
            },
        );
    }

    #[cfg(test)]
    pub(crate) fn get(&self, node: &VNode) -> Option<Rc<ComponentContext>> {
        self.entries
            .get(&node.identity())
            .filter(|entry| entry.node.is(node))
            .map(|entry| entry.context.clone())
    }

    pub(crate) fn remove(&mut self, node: &VNode) -> Option<Rc<ComponentContext>> {
        match self.entries.get(&node.identity()) {
            Some(entry) if entry.node.is(node) => {}
            _ => return None,
        }
        self.entries
            .remove(&node.identity())
            .map(|entry| entry.context)
    }

    /// Move the context owned by `old` over to `new`.
    pub(crate) fn transfer(&mut self, old: &VNode, new: &VNode) -> Option<Rc<ComponentContext>> {
        let context = self.remove(old)?;
        context.adopt(new);
        self.insert(new, context.clone());
        Some(context)
    }

    /// Drop entries whose owning node is gone. Returns the orphaned
    /// contexts so the caller can destroy them outside the borrow.
    pub(crate) fn prune(&mut self) -> Vec<Rc<ComponentContext>> {
        let dead: Vec<usize> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.node.is_alive())
            .map(|(id, _)| *id)
            .collect();
        let orphans: Vec<_> = dead
            .into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .map(|entry| entry.context)
            .collect();
        if !orphans.is_empty() {
            trace!(count = orphans.len(), "pruned orphaned contexts");
        }
        orphans
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
