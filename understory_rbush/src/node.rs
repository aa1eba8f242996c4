// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena storage for tree nodes and indexed entries.
//!
//! Nodes and entries live in flat vectors and refer to each other by index, so the
//! tree owns everything through a single value and no node holds a back-reference.
//! Freed slots are recycled through free lists.

use alloc::vec::Vec;

use crate::types::{Aabb2D, Scalar};

/// Index of a node in the arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeIdx(usize);

/// Index of an entry in the arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct EntryIdx(usize);

/// A child slot: a subtree for internal nodes, an entry for leaves.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RChild {
    Node(NodeIdx),
    Entry(EntryIdx),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RNode<T> {
    /// Tight union of the children's boxes.
    pub(crate) bbox: Aabb2D<T>,
    /// 1 for leaves.
    pub(crate) height: usize,
    pub(crate) children: Vec<RChild>,
}

#[derive(Clone, Debug)]
pub(crate) struct Entry<T, V> {
    pub(crate) bbox: Aabb2D<T>,
    pub(crate) value: V,
}

#[derive(Clone, Debug)]
pub(crate) struct Arena<T, V> {
    nodes: Vec<RNode<T>>,
    free_nodes: Vec<usize>,
    entries: Vec<Option<Entry<T, V>>>,
    free_entries: Vec<usize>,
}

impl<T, V> Default for Arena<T, V> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            entries: Vec::new(),
            free_entries: Vec::new(),
        }
    }
}

impl<T: Scalar, V> Arena<T, V> {
    pub(crate) fn alloc_node(&mut self, node: RNode<T>) -> NodeIdx {
        if let Some(i) = self.free_nodes.pop() {
            self.nodes[i] = node;
            NodeIdx(i)
        } else {
            self.nodes.push(node);
            NodeIdx(self.nodes.len() - 1)
        }
    }

    /// Release a node slot, handing back its children.
    pub(crate) fn free_node(&mut self, idx: NodeIdx) -> Vec<RChild> {
        self.free_nodes.push(idx.0);
        core::mem::take(&mut self.nodes[idx.0].children)
    }

    #[inline]
    pub(crate) fn node(&self, idx: NodeIdx) -> &RNode<T> {
        &self.nodes[idx.0]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, idx: NodeIdx) -> &mut RNode<T> {
        &mut self.nodes[idx.0]
    }

    pub(crate) fn alloc_entry(&mut self, bbox: Aabb2D<T>, value: V) -> EntryIdx {
        let entry = Some(Entry { bbox, value });
        if let Some(i) = self.free_entries.pop() {
            self.entries[i] = entry;
            EntryIdx(i)
        } else {
            self.entries.push(entry);
            EntryIdx(self.entries.len() - 1)
        }
    }

    pub(crate) fn free_entry(&mut self, idx: EntryIdx) -> Option<Entry<T, V>> {
        let entry = self.entries.get_mut(idx.0)?.take()?;
        self.free_entries.push(idx.0);
        Some(entry)
    }

    /// Panics on a freed slot; leaves only ever point at live entries.
    #[inline]
    pub(crate) fn entry(&self, idx: EntryIdx) -> &Entry<T, V> {
        self.entries[idx.0]
            .as_ref()
            .expect("leaf refers to a freed entry")
    }

    #[inline]
    pub(crate) fn child_bbox(&self, child: RChild) -> Aabb2D<T> {
        match child {
            RChild::Node(i) => self.nodes[i.0].bbox,
            RChild::Entry(e) => self.entry(e).bbox,
        }
    }

    /// Union of the children's boxes, `None` for an empty list.
    pub(crate) fn children_bbox(&self, children: &[RChild]) -> Option<Aabb2D<T>> {
        let mut it = children.iter().map(|&c| self.child_bbox(c));
        let first = it.next()?;
        Some(it.fold(first, |acc, b| acc.union(&b)))
    }

    /// Recompute a node's box from its children. Empty nodes keep their old box.
    pub(crate) fn refresh_bbox(&mut self, idx: NodeIdx) {
        if let Some(bb) = self.children_bbox(&self.nodes[idx.0].children) {
            self.nodes[idx.0].bbox = bb;
        }
    }

    pub(crate) fn live_nodes(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.free_nodes.clear();
        self.entries.clear();
        self.free_entries.clear();
    }

    /// Snapshot of the node storage, for structural comparisons.
    #[cfg(test)]
    pub(crate) fn nodes(&self) -> &[RNode<T>] {
        &self.nodes
    }
}
