// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The R-tree: insertion, removal, queries, and bulk loading.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;
use core::ops::ControlFlow;

use hashbrown::{HashMap, HashSet};
use tracing::{debug, trace};

use crate::bulk;
use crate::config::RTreeConfig;
use crate::error::{RBushError, Result};
use crate::node::{Arena, EntryIdx, NodeIdx, RChild, RNode};
use crate::split::quadratic_split;
use crate::types::{Aabb2D, Scalar, area};

/// A mutable R-tree mapping bounding boxes to values.
///
/// Values are opaque handles (feature ids, keys into another store, ...) and double as
/// lookup keys for [`update`](RTree::update) and [`remove`](RTree::remove): a value can
/// be indexed at most once at a time.
///
/// Insertion uses least-enlargement descent and a quadratic split; removal condenses
/// underfull nodes by reinserting their children; [`load`](RTree::load) packs a batch
/// with Sort-Tile-Recursive. All leaves stay at the same depth, and every node except
/// the root holds between [`RTreeConfig::min_entries`] and
/// [`RTreeConfig::max_entries`] children.
///
/// Failing calls return an [`RBushError`] and leave the tree untouched.
///
/// ```rust
/// use understory_rbush::{Aabb2D, RTree};
///
/// let mut tree: RTree<f64, &str> = RTree::new();
/// tree.insert(Aabb2D::new(0.0, 0.0, 10.0, 10.0), "lake").unwrap();
/// tree.insert(Aabb2D::new(20.0, 20.0, 30.0, 30.0), "summit").unwrap();
///
/// let hits: Vec<_> = tree.query(Aabb2D::new(5.0, 5.0, 15.0, 15.0)).collect();
/// assert_eq!(hits, [&"lake"]);
///
/// tree.update(Aabb2D::new(8.0, 8.0, 9.0, 9.0), &"summit").unwrap();
/// assert_eq!(tree.query(Aabb2D::new(5.0, 5.0, 15.0, 15.0)).count(), 2);
/// ```
#[derive(Clone)]
pub struct RTree<T: Scalar, V> {
    config: RTreeConfig,
    min_entries: usize,
    root: Option<NodeIdx>,
    arena: Arena<T, V>,
    lookup: HashMap<V, EntryIdx>,
}

impl<T: Scalar, V> Default for RTree<T, V> {
    fn default() -> Self {
        Self::from_valid_config(RTreeConfig::default())
    }
}

impl<T: Scalar, V> RTree<T, V> {
    /// Create an empty tree with the default fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tree with the given configuration.
    pub fn with_config(config: RTreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    /// Create an empty tree whose nodes hold at most `max_entries` children.
    pub fn with_max_entries(max_entries: usize) -> Result<Self> {
        Self::with_config(RTreeConfig::new(max_entries))
    }

    fn from_valid_config(config: RTreeConfig) -> Self {
        Self {
            config,
            min_entries: config.min_entries(),
            root: None,
            arena: Arena::default(),
            lookup: HashMap::new(),
        }
    }

    /// The configuration the tree was built with.
    pub fn config(&self) -> RTreeConfig {
        self.config
    }

    /// Number of indexed values.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// True if no value is indexed.
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Number of levels: 0 when empty, 1 when the root is a leaf.
    pub fn height(&self) -> usize {
        self.root.map_or(0, |r| self.arena.node(r).height)
    }

    /// The box enclosing every indexed value, or `None` when the tree is empty.
    pub fn extent(&self) -> Option<Aabb2D<T>> {
        self.root.map(|r| self.arena.node(r).bbox)
    }

    /// Drop every value and node.
    pub fn clear(&mut self) {
        debug!(len = self.lookup.len(), "clearing index");
        self.root = None;
        self.arena.clear();
        self.lookup.clear();
    }

    /// Values whose box intersects `rect`. Boxes that only touch `rect` are included.
    ///
    /// The traversal is lazy: subtrees are only opened as the iterator advances.
    pub fn query(&self, rect: Aabb2D<T>) -> Query<'_, T, V> {
        Query::new(self, Some(rect))
    }

    /// Values whose box contains the point.
    pub fn query_point(&self, x: T, y: T) -> Query<'_, T, V> {
        self.query(Aabb2D::point(x, y))
    }

    /// Every indexed value, in depth-first order.
    pub fn all(&self) -> Query<'_, T, V> {
        Query::new(self, None)
    }

    /// Call `f` for every value, depth first.
    ///
    /// Stops at the first [`ControlFlow::Break`] and returns it; returns
    /// [`ControlFlow::Continue`] when every value was visited.
    ///
    /// ```rust
    /// use core::ops::ControlFlow;
    /// use understory_rbush::{Aabb2D, RTree};
    ///
    /// let mut tree: RTree<i64, u32> = RTree::new();
    /// for i in 0..10 {
    ///     tree.insert(Aabb2D::new(i, i, i + 1, i + 1), i as u32).unwrap();
    /// }
    /// let found = tree.for_each(|&v| if v > 6 { ControlFlow::Break(v) } else { ControlFlow::Continue(()) });
    /// assert!(matches!(found, ControlFlow::Break(v) if v > 6));
    /// ```
    pub fn for_each<B>(&self, f: impl FnMut(&V) -> ControlFlow<B>) -> ControlFlow<B> {
        self.all().try_for_each(f)
    }

    /// Like [`for_each`](RTree::for_each), restricted to values whose box intersects `extent`.
    ///
    /// Subtrees whose box does not intersect `extent` are skipped entirely.
    pub fn for_each_in_extent<B>(
        &self,
        extent: Aabb2D<T>,
        f: impl FnMut(&V) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        self.query(extent).try_for_each(f)
    }

    /// Add `child` under a node of height `parent_height`, splitting overfull nodes on the
    /// way back up. An entry always goes under a leaf (`parent_height == 1`).
    ///
    /// Subtrees are only ever linked below the root, so `parent_height` never exceeds
    /// the tree height, and an empty tree only receives entries.
    fn insert_child(&mut self, child: RChild, bbox: Aabb2D<T>, parent_height: usize) {
        let Some(root) = self.root else {
            debug_assert_eq!(parent_height, 1, "subtree linked into an empty tree");
            self.root = Some(self.arena.alloc_node(RNode {
                bbox,
                height: 1,
                children: vec![child],
            }));
            return;
        };
        let root_height = self.arena.node(root).height;
        debug_assert!(
            parent_height <= root_height,
            "subtree of height {parent_height} is taller than the tree"
        );

        let mut path = Vec::with_capacity(root_height + 1 - parent_height);
        let mut idx = root;
        loop {
            path.push(idx);
            let node = self.arena.node_mut(idx);
            node.bbox = node.bbox.union(&bbox);
            if node.height == parent_height {
                node.children.push(child);
                break;
            }
            idx = self.choose_subtree(idx, &bbox);
        }
        self.split_overflow(&path);
    }

    /// Child needing the least area enlargement; ties go to the smaller resulting area,
    /// then the smaller current area.
    fn choose_subtree(&self, idx: NodeIdx, bbox: &Aabb2D<T>) -> NodeIdx {
        let mut best: Option<(NodeIdx, T::Acc, T::Acc, T::Acc)> = None;
        for child in &self.arena.node(idx).children {
            let RChild::Node(ci) = *child else {
                continue;
            };
            let current = self.arena.node(ci).bbox;
            let before = area(&current);
            let after = area(&current.union(bbox));
            let grow = after - before;
            let better = match best {
                None => true,
                Some((_, bg, ba, bb)) => {
                    grow < bg || (grow == bg && (after < ba || (after == ba && before < bb)))
                }
            };
            if better {
                best = Some((ci, grow, after, before));
            }
        }
        best.map(|(ci, ..)| ci)
            .expect("internal nodes always have children")
    }

    /// Split overfull nodes along `path` (root first), bottom-up.
    fn split_overflow(&mut self, path: &[NodeIdx]) {
        for (depth, &idx) in path.iter().enumerate().rev() {
            if self.arena.node(idx).children.len() <= self.config.max_entries {
                break;
            }
            let sibling = self.split_node(idx);
            if let Some(parent_depth) = depth.checked_sub(1) {
                // The parent's box already covers both halves.
                self.arena
                    .node_mut(path[parent_depth])
                    .children
                    .push(RChild::Node(sibling));
            } else {
                let height = self.arena.node(idx).height + 1;
                let bbox = self
                    .arena
                    .node(idx)
                    .bbox
                    .union(&self.arena.node(sibling).bbox);
                let new_root = self.arena.alloc_node(RNode {
                    bbox,
                    height,
                    children: vec![RChild::Node(idx), RChild::Node(sibling)],
                });
                self.root = Some(new_root);
                trace!(height, "root split");
            }
        }
    }

    /// Split an overfull node in place, returning its new sibling.
    fn split_node(&mut self, idx: NodeIdx) -> NodeIdx {
        let children = core::mem::take(&mut self.arena.node_mut(idx).children);
        let items = children
            .into_iter()
            .map(|c| (c, self.arena.child_bbox(c)))
            .collect();
        let split = quadratic_split(items, self.min_entries);
        let node = self.arena.node_mut(idx);
        let height = node.height;
        trace!(
            height,
            left = split.left.len(),
            right = split.right.len(),
            "split node"
        );
        node.children = split.left;
        node.bbox = split.left_bbox;
        self.arena.alloc_node(RNode {
            bbox: split.right_bbox,
            height,
            children: split.right,
        })
    }

    /// Root-to-leaf path to `entry` as `(node, child slot)` pairs.
    ///
    /// Only descends into nodes whose box contains the entry's box.
    fn find_path(&self, entry: EntryIdx, bbox: &Aabb2D<T>) -> Option<Vec<(NodeIdx, usize)>> {
        let mut path = Vec::with_capacity(self.height());
        self.descend_to(self.root?, entry, bbox, &mut path)
            .then_some(path)
    }

    fn descend_to(
        &self,
        idx: NodeIdx,
        entry: EntryIdx,
        bbox: &Aabb2D<T>,
        path: &mut Vec<(NodeIdx, usize)>,
    ) -> bool {
        let node = self.arena.node(idx);
        if !node.bbox.contains(bbox) {
            return false;
        }
        for (slot, &child) in node.children.iter().enumerate() {
            match child {
                RChild::Entry(e) if e == entry => {
                    path.push((idx, slot));
                    return true;
                }
                RChild::Entry(_) => {}
                RChild::Node(ci) => {
                    path.push((idx, slot));
                    if self.descend_to(ci, entry, bbox, path) {
                        return true;
                    }
                    path.pop();
                }
            }
        }
        false
    }

    /// Fix up the path after a child was removed from its last node.
    ///
    /// Underfull non-root nodes are detached and their children reinserted at their
    /// own height, tallest first; the rest get tight boxes.
    fn condense(&mut self, path: &[(NodeIdx, usize)]) {
        let mut orphans: Vec<(RChild, Aabb2D<T>, usize)> = Vec::new();
        for depth in (1..path.len()).rev() {
            let (idx, _) = path[depth];
            if self.arena.node(idx).children.len() >= self.min_entries {
                self.arena.refresh_bbox(idx);
                continue;
            }
            let (parent, slot) = path[depth - 1];
            let detached = self.arena.node_mut(parent).children.remove(slot);
            debug_assert_eq!(detached, RChild::Node(idx), "path slot out of sync");
            let height = self.arena.node(idx).height;
            for child in self.arena.free_node(idx) {
                orphans.push((child, self.arena.child_bbox(child), height));
            }
        }

        let (root, _) = path[0];
        if self.arena.node(root).children.is_empty() {
            self.arena.free_node(root);
            self.root = None;
        } else {
            self.arena.refresh_bbox(root);
        }

        if !orphans.is_empty() {
            debug!(count = orphans.len(), "reinserting orphaned children");
            orphans.sort_by(|a, b| b.2.cmp(&a.2));
            for (child, bbox, height) in orphans {
                self.insert_child(child, bbox, height);
            }
        }
        self.collapse_root();
    }

    /// Replace an internal root that has a single child by that child.
    fn collapse_root(&mut self) {
        while let Some(root) = self.root {
            let [RChild::Node(only)] = self.arena.node(root).children[..] else {
                break;
            };
            self.arena.free_node(root);
            self.root = Some(only);
            trace!(height = self.arena.node(only).height, "collapsed root");
        }
    }

    /// Link a freshly packed subtree into a non-empty tree.
    fn merge(&mut self, existing: NodeIdx, built: NodeIdx) {
        let (tall, short) = if self.arena.node(built).height > self.arena.node(existing).height {
            (built, existing)
        } else {
            (existing, built)
        };
        self.root = Some(tall);
        let tall_height = self.arena.node(tall).height;
        let short_node = self.arena.node(short);
        let (short_height, short_bbox) = (short_node.height, short_node.bbox);

        if short_height < tall_height && short_node.children.len() >= self.min_entries {
            debug!(tall_height, short_height, "grafting subtree");
            self.insert_child(RChild::Node(short), short_bbox, short_height + 1);
        } else {
            // Equal heights, or a root too small to stand as an inner node: graft its children.
            debug!(tall_height, short_height, "grafting top-level children");
            for child in self.arena.free_node(short) {
                let bbox = self.arena.child_bbox(child);
                self.insert_child(child, bbox, short_height);
            }
        }
    }
}

impl<T: Scalar, V: Clone + Eq + Hash> RTree<T, V> {
    /// Build a tree from a batch of entries in one pass.
    ///
    /// See [`load`](RTree::load) for the validation rules.
    pub fn bulk_load<I>(config: RTreeConfig, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Aabb2D<T>, V)>,
    {
        let mut tree = Self::with_config(config)?;
        tree.load(entries)?;
        Ok(tree)
    }

    /// Index `value` under `bbox`.
    ///
    /// Fails with [`RBushError::DuplicateValue`] if `value` is already indexed and with
    /// [`RBushError::InvalidExtent`] if `bbox` is inverted or NaN.
    pub fn insert(&mut self, bbox: Aabb2D<T>, value: V) -> Result<()> {
        if !bbox.is_valid() {
            return Err(RBushError::InvalidExtent);
        }
        if self.lookup.contains_key(&value) {
            return Err(RBushError::DuplicateValue);
        }
        self.insert_unchecked(bbox, value);
        Ok(())
    }

    fn insert_unchecked(&mut self, bbox: Aabb2D<T>, value: V) {
        let entry = self.arena.alloc_entry(bbox, value.clone());
        self.lookup.insert(value, entry);
        self.insert_child(RChild::Entry(entry), bbox, 1);
    }

    /// Insert a batch of entries, packing them into a balanced subtree first.
    ///
    /// The whole batch is validated before anything changes: a malformed box fails with
    /// [`RBushError::InvalidExtent`], a value that is already indexed or repeated within
    /// the batch fails with [`RBushError::DuplicateValue`].
    ///
    /// Batches smaller than the minimum fill are inserted one by one. Otherwise the packed
    /// subtree is merged into the existing tree at the matching height, which keeps
    /// the tree balanced without rebuilding it.
    pub fn load<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (Aabb2D<T>, V)>,
    {
        let batch: Vec<(Aabb2D<T>, V)> = entries.into_iter().collect();
        let mut seen = HashSet::with_capacity(batch.len());
        for (bbox, value) in &batch {
            if !bbox.is_valid() {
                return Err(RBushError::InvalidExtent);
            }
            if self.lookup.contains_key(value) || !seen.insert(value) {
                return Err(RBushError::DuplicateValue);
            }
        }
        drop(seen);

        if batch.len() < self.min_entries {
            for (bbox, value) in batch {
                self.insert_unchecked(bbox, value);
            }
            return Ok(());
        }

        let count = batch.len();
        let items: Vec<(RChild, Aabb2D<T>)> = batch
            .into_iter()
            .map(|(bbox, value)| {
                let entry = self.arena.alloc_entry(bbox, value.clone());
                self.lookup.insert(value, entry);
                (RChild::Entry(entry), bbox)
            })
            .collect();
        let Some(built) = bulk::build(&mut self.arena, items, self.config.max_entries) else {
            return Ok(());
        };
        debug!(
            count,
            height = self.arena.node(built).height,
            "packed bulk subtree"
        );
        match self.root {
            None => self.root = Some(built),
            Some(existing) => self.merge(existing, built),
        }
        Ok(())
    }

    /// Remove `value`, returning the box it was indexed under.
    ///
    /// Fails with [`RBushError::NotFound`] if `value` is not indexed.
    pub fn remove(&mut self, value: &V) -> Result<Aabb2D<T>> {
        let Some(&entry) = self.lookup.get(value) else {
            return Err(RBushError::NotFound);
        };
        let bbox = self.arena.entry(entry).bbox;
        let path = self
            .find_path(entry, &bbox)
            .expect("indexed value must be reachable from the root");
        self.lookup.remove(value);
        self.arena.free_entry(entry);
        let (leaf, slot) = path[path.len() - 1];
        self.arena.node_mut(leaf).children.remove(slot);
        self.condense(&path);
        Ok(bbox)
    }

    /// Move `value` to `bbox`.
    ///
    /// A no-op when the box is unchanged; otherwise the value is removed and reinserted.
    /// Fails with [`RBushError::NotFound`] if `value` is not indexed and with
    /// [`RBushError::InvalidExtent`] if `bbox` is malformed.
    pub fn update(&mut self, bbox: Aabb2D<T>, value: &V) -> Result<()> {
        let Some(&entry) = self.lookup.get(value) else {
            return Err(RBushError::NotFound);
        };
        if !bbox.is_valid() {
            return Err(RBushError::InvalidExtent);
        }
        if self.arena.entry(entry).bbox == bbox {
            return Ok(());
        }
        self.remove(value)?;
        self.insert_unchecked(bbox, value.clone());
        Ok(())
    }

    /// The box `value` is indexed under.
    pub fn get(&self, value: &V) -> Option<Aabb2D<T>> {
        self.lookup.get(value).map(|&e| self.arena.entry(e).bbox)
    }

    /// True if `value` is indexed.
    pub fn contains(&self, value: &V) -> bool {
        self.lookup.contains_key(value)
    }
}

impl<T: Scalar, V> Debug for RTree<T, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RTree")
            .field("max_entries", &self.config.max_entries)
            .field("min_entries", &self.min_entries)
            .field("len", &self.lookup.len())
            .field("height", &self.height())
            .field("nodes", &self.arena.live_nodes())
            .finish_non_exhaustive()
    }
}

/// R-tree with i64 coordinates and i128 metrics.
pub type RTreeI64<V> = RTree<i64, V>;

/// R-tree with f32 coordinates and f64 metrics.
pub type RTreeF32<V> = RTree<f32, V>;

/// R-tree with f64 coordinates and f64 metrics.
pub type RTreeF64<V> = RTree<f64, V>;

/// Depth-first iterator over the values of an [`RTree`], optionally restricted to those
/// whose box intersects a window.
///
/// Returned by [`RTree::query`], [`RTree::query_point`], and [`RTree::all`].
pub struct Query<'a, T: Scalar, V> {
    tree: &'a RTree<T, V>,
    filter: Option<Aabb2D<T>>,
    /// Nodes still to open.
    stack: Vec<NodeIdx>,
    /// Remaining children of the leaf being scanned.
    leaf: &'a [RChild],
}

impl<'a, T: Scalar, V> Query<'a, T, V> {
    fn new(tree: &'a RTree<T, V>, filter: Option<Aabb2D<T>>) -> Self {
        Self {
            tree,
            filter,
            stack: tree.root.into_iter().collect(),
            leaf: &[],
        }
    }
}

impl<'a, T: Scalar, V> Iterator for Query<'a, T, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        let tree = self.tree;
        loop {
            while let Some((&child, rest)) = self.leaf.split_first() {
                self.leaf = rest;
                if let RChild::Entry(e) = child {
                    let entry = tree.arena.entry(e);
                    if self.filter.is_none_or(|r| entry.bbox.intersects(&r)) {
                        return Some(&entry.value);
                    }
                }
            }
            let node = tree.arena.node(self.stack.pop()?);
            if self.filter.is_some_and(|r| !node.bbox.intersects(&r)) {
                continue;
            }
            if node.height == 1 {
                self.leaf = &node.children;
            } else {
                self.stack
                    .extend(node.children.iter().rev().filter_map(|c| match c {
                        RChild::Node(ci) => Some(*ci),
                        RChild::Entry(_) => None,
                    }));
            }
        }
    }
}

impl<T: Scalar, V> Debug for Query<'_, T, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Query")
            .field("filter", &self.filter)
            .field("pending_nodes", &self.stack.len())
            .field("pending_children", &self.leaf.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl<T: Scalar, V: Eq + Hash> RTree<T, V> {
    /// Walk the whole tree and assert every structural invariant.
    pub(crate) fn check_invariants(&self) {
        let Some(root) = self.root else {
            assert!(self.lookup.is_empty(), "values indexed without a root");
            assert_eq!(self.arena.live_nodes(), 0, "nodes leaked");
            return;
        };
        let (mut entries, mut nodes) = (0, 0);
        self.check_node(root, true, &mut entries, &mut nodes);
        assert_eq!(entries, self.lookup.len(), "tree and lookup disagree");
        assert_eq!(nodes, self.arena.live_nodes(), "nodes leaked");
    }

    fn check_node(&self, idx: NodeIdx, is_root: bool, entries: &mut usize, nodes: &mut usize) {
        *nodes += 1;
        let node = self.arena.node(idx);
        let n = node.children.len();
        assert!(n <= self.config.max_entries, "overfull node: {n}");
        if is_root {
            assert!(n >= 1, "empty root");
            assert!(node.height == 1 || n >= 2, "internal root with one child");
        } else {
            assert!(n >= self.min_entries, "underfull node: {n}");
        }
        assert_eq!(
            Some(node.bbox),
            self.arena.children_bbox(&node.children),
            "node box is not the tight union of its children"
        );
        for &child in &node.children {
            match child {
                RChild::Entry(e) => {
                    assert_eq!(node.height, 1, "entry above leaf level");
                    let value = &self.arena.entry(e).value;
                    assert_eq!(self.lookup.get(value), Some(&e), "lookup is stale");
                    *entries += 1;
                }
                RChild::Node(ci) => {
                    assert_eq!(self.arena.node(ci).height + 1, node.height, "unbalanced");
                    self.check_node(ci, false, entries, nodes);
                }
            }
        }
    }
}
