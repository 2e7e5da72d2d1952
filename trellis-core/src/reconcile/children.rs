//! Child list reconciliation.
//!
//! Lists where no child carries a key are patched position by position.
//! As soon as one child on either side has a key, children are matched by
//! key instead (unkeyed children fall back to their index), so reordering
//! moves host nodes rather than rebuilding them.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use super::Reconciler;
use crate::host::HostNode;
use crate::vdom::{Key, VNode};

/// Identity of a child within its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot<'a> {
    Keyed(&'a Key),
    Index(usize),
}

fn slot(node: &VNode, index: usize) -> Slot<'_> {
    match node.key() {
        Some(key) => Slot::Keyed(key),
        None => Slot::Index(index),
    }
}

impl Reconciler<'_> {
    pub(super) fn patch_children(&self, parent: &HostNode, new: &[VNode], old: &[VNode]) {
        if new.iter().chain(old).any(|node| node.key().is_some()) {
            self.patch_keyed(parent, new, old);
        } else {
            self.patch_positional(parent, new, old);
        }
    }

    fn patch_positional(&self, parent: &HostNode, new: &[VNode], old: &[VNode]) {
        // Surplus old children go from the back so earlier indices stay valid.
        for index in (new.len()..old.len()).rev() {
            self.patch(parent, None, old.get(index));
        }
        for index in 0..new.len() {
            self.patch(parent, new.get(index), old.get(index));
        }
    }

    fn patch_keyed(&self, parent: &HostNode, new: &[VNode], old: &[VNode]) {
        let mut old_by_slot: HashMap<Slot<'_>, &VNode> = HashMap::with_capacity(old.len());
        for (index, node) in old.iter().enumerate() {
            old_by_slot.entry(slot(node, index)).or_insert(node);
        }
        let wanted: HashSet<Slot<'_>> = new
            .iter()
            .enumerate()
            .map(|(index, node)| slot(node, index))
            .collect();

        // Drop old children that no new child claims, including duplicates
        // shadowed by an earlier child with the same key.
        for (index, node) in old.iter().enumerate() {
            let key = slot(node, index);
            let claimable = old_by_slot.get(&key).is_some_and(|first| first.same(node));
            if !claimable || !wanted.contains(&key) {
                self.patch(parent, None, Some(node));
            }
        }

        let mut seen: HashSet<Slot<'_>> = HashSet::with_capacity(new.len());
        for (index, node) in new.iter().enumerate() {
            let key = slot(node, index);
            let reused = if seen.insert(key) {
                old_by_slot.get(&key).copied()
            } else {
                if let Slot::Keyed(key) = key {
                    warn!(%key, "duplicate key in child list; building a fresh node");
                }
                None
            };

            match reused {
                Some(previous) => {
                    if let Some(host) = previous.host() {
                        if parent.index_of(&host) != Some(index) {
                            parent.insert_at(index, &host);
                        }
                    }
                    self.patch(parent, Some(node), Some(previous));
                }
                None => {
                    let host = self.build(node);
                    parent.insert_at(index, &host);
                }
            }
        }
    }
}
