// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A shared, re-entrancy checked handle to a tree.
//!
//! [`RTree`] takes `&mut self` for mutations, so the compiler already forbids mutating
//! it from inside one of its own traversals. Owners that hand the index to callbacks
//! (renderers, hit testers, editing tools) often need shared access instead; for them
//! [`SharedRTree`] keeps an active-reader count and rejects mutations while any read
//! is in progress, rather than letting the callback corrupt the traversal.

use alloc::vec::Vec;
use core::cell::{Cell, RefCell, RefMut};
use core::fmt::Debug;
use core::hash::Hash;
use core::ops::ControlFlow;

use tracing::error;

use crate::error::{RBushError, Result};
use crate::rtree::RTree;
use crate::types::{Aabb2D, Scalar};

/// Single-threaded shared handle to an [`RTree`] with an active-reader count.
///
/// All methods take `&self`. Reads (`for_each`, `query`, ...) may nest freely.
/// Read results are returned as owned values so nothing borrowed outlives the call.
/// The handle is not `Sync`: sharing it across threads requires the owner's own lock.
///
/// # Panics
///
/// Mutating the index while a read is active is a programming error. Debug builds
/// panic on it; release builds log it and return [`RBushError::ConcurrentMutation`].
/// Either way the tree is left unchanged.
///
/// ```rust
/// use core::ops::ControlFlow;
/// use understory_rbush::{Aabb2D, SharedRTree};
///
/// let index: SharedRTree<f64, u32> = SharedRTree::default();
/// index.insert(Aabb2D::new(0.0, 0.0, 1.0, 1.0), 1).unwrap();
/// index.insert(Aabb2D::new(2.0, 0.0, 3.0, 1.0), 2).unwrap();
///
/// // Collect edits during the walk, apply them once it is over.
/// let mut stale = Vec::new();
/// let _ = index.for_each(|&v| {
///     if v == 2 {
///         stale.push(v);
///     }
///     ControlFlow::<()>::Continue(())
/// });
/// for v in stale {
///     index.remove(&v).unwrap();
/// }
/// assert_eq!(index.len(), 1);
/// ```
pub struct SharedRTree<T: Scalar, V> {
    tree: RefCell<RTree<T, V>>,
    readers: Cell<usize>,
}

/// Keeps the reader count raised for as long as it lives, including during unwinding.
struct ReadGuard<'a>(&'a Cell<usize>);

impl<'a> ReadGuard<'a> {
    fn enter(readers: &'a Cell<usize>) -> Self {
        readers.set(readers.get() + 1);
        Self(readers)
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl<T: Scalar, V> Default for SharedRTree<T, V> {
    fn default() -> Self {
        Self::new(RTree::default())
    }
}

impl<T: Scalar, V> From<RTree<T, V>> for SharedRTree<T, V> {
    fn from(tree: RTree<T, V>) -> Self {
        Self::new(tree)
    }
}

impl<T: Scalar, V> SharedRTree<T, V> {
    /// Wrap an existing tree.
    pub fn new(tree: RTree<T, V>) -> Self {
        Self {
            tree: RefCell::new(tree),
            readers: Cell::new(0),
        }
    }

    /// Unwrap the tree.
    pub fn into_inner(self) -> RTree<T, V> {
        self.tree.into_inner()
    }

    /// Number of read traversals currently in progress.
    pub fn active_readers(&self) -> usize {
        self.readers.get()
    }

    /// Run `f` with read access to the tree. Counts as an active reader.
    pub fn read<R>(&self, f: impl FnOnce(&RTree<T, V>) -> R) -> R {
        let _guard = ReadGuard::enter(&self.readers);
        let tree = self.tree.borrow();
        f(&tree)
    }

    /// See [`RTree::for_each`].
    pub fn for_each<B>(&self, f: impl FnMut(&V) -> ControlFlow<B>) -> ControlFlow<B> {
        self.read(|tree| tree.for_each(f))
    }

    /// See [`RTree::for_each_in_extent`].
    pub fn for_each_in_extent<B>(
        &self,
        extent: Aabb2D<T>,
        f: impl FnMut(&V) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        self.read(|tree| tree.for_each_in_extent(extent, f))
    }

    /// Number of indexed values.
    pub fn len(&self) -> usize {
        self.read(RTree::len)
    }

    /// True if no value is indexed.
    pub fn is_empty(&self) -> bool {
        self.read(RTree::is_empty)
    }

    /// See [`RTree::extent`].
    pub fn extent(&self) -> Option<Aabb2D<T>> {
        self.read(RTree::extent)
    }

    /// Borrow the tree for a mutation, unless a read is in progress.
    fn write(&self, op: &'static str) -> Result<RefMut<'_, RTree<T, V>>> {
        let readers = self.readers.get();
        if readers > 0 {
            error!(op, readers, "index mutated during a read traversal");
            debug_assert_eq!(readers, 0, "cannot {op} while the index is being read");
            return Err(RBushError::ConcurrentMutation { op });
        }
        self.tree
            .try_borrow_mut()
            .map_err(|_| RBushError::ConcurrentMutation { op })
    }

    /// See [`RTree::clear`]. Fails while a read is in progress.
    pub fn clear(&self) -> Result<()> {
        self.write("clear")?.clear();
        Ok(())
    }
}

impl<T: Scalar, V: Clone> SharedRTree<T, V> {
    /// See [`RTree::query`]; values are cloned out.
    pub fn query(&self, rect: Aabb2D<T>) -> Vec<V> {
        self.read(|tree| tree.query(rect).cloned().collect())
    }

    /// See [`RTree::query_point`]; values are cloned out.
    pub fn query_point(&self, x: T, y: T) -> Vec<V> {
        self.read(|tree| tree.query_point(x, y).cloned().collect())
    }

    /// See [`RTree::all`]; values are cloned out.
    pub fn all(&self) -> Vec<V> {
        self.read(|tree| tree.all().cloned().collect())
    }
}

impl<T: Scalar, V: Clone + Eq + Hash> SharedRTree<T, V> {
    /// See [`RTree::insert`]. Fails while a read is in progress.
    pub fn insert(&self, bbox: Aabb2D<T>, value: V) -> Result<()> {
        self.write("insert")?.insert(bbox, value)
    }

    /// See [`RTree::remove`]. Fails while a read is in progress.
    pub fn remove(&self, value: &V) -> Result<Aabb2D<T>> {
        self.write("remove")?.remove(value)
    }

    /// See [`RTree::update`]. Fails while a read is in progress.
    pub fn update(&self, bbox: Aabb2D<T>, value: &V) -> Result<()> {
        self.write("update")?.update(bbox, value)
    }

    /// See [`RTree::load`]. Fails while a read is in progress.
    pub fn load<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (Aabb2D<T>, V)>,
    {
        self.write("load")?.load(entries)
    }

    /// See [`RTree::get`].
    pub fn get(&self, value: &V) -> Option<Aabb2D<T>> {
        self.read(|tree| tree.get(value))
    }

    /// See [`RTree::contains`].
    pub fn contains(&self, value: &V) -> bool {
        self.read(|tree| tree.contains(value))
    }
}

impl<T: Scalar, V> Debug for SharedRTree<T, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut s = f.debug_struct("SharedRTree");
        s.field("readers", &self.readers.get());
        match self.tree.try_borrow() {
            Ok(tree) => s.field("tree", &*tree),
            Err(_) => s.field("tree", &"<borrowed>"),
        };
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RTreeConfig;
    use alloc::vec;
    use core::panic::AssertUnwindSafe;

    fn sample() -> SharedRTree<i64, u32> {
        let tree = RTree::bulk_load(
            RTreeConfig::new(4),
            (0..30_u32).map(|i| {
                let x = i64::from(i);
                (Aabb2D::new(x, 0, x + 1, 1), i)
            }),
        )
        .unwrap();
        SharedRTree::from(tree)
    }

    /// Attempt every mutation from inside a traversal, one at a time.
    ///
    /// Returns what each attempt produced: `Some(result)` when it returned, `None` when
    /// it panicked.
    fn mutate_while_reading(index: &SharedRTree<i64, u32>) -> Vec<Option<Result<()>>> {
        let attempts: [&dyn Fn(u32) -> Result<()>; 5] = [
            &|v| index.insert(Aabb2D::new(100, 100, 101, 101), 1000 + v),
            &|v| index.remove(&v).map(|_| ()),
            &|v| index.update(Aabb2D::new(5, 5, 6, 6), &v),
            &|_| index.clear(),
            &|v| index.load(vec![(Aabb2D::new(0, 0, 1, 1), 2000 + v)]),
        ];
        attempts
            .iter()
            .map(|attempt| {
                std::panic::catch_unwind(AssertUnwindSafe(|| {
                    index.for_each(|&v| ControlFlow::Break(attempt(v)))
                }))
                .ok()
                .map(|flow| match flow {
                    ControlFlow::Break(result) => result,
                    ControlFlow::Continue(()) => Ok(()),
                })
            })
            .collect()
    }

    #[test]
    fn mutation_inside_traversal_leaves_tree_untouched() {
        let index = sample();
        let before = index.all();
        let outcomes = mutate_while_reading(&index);
        assert_eq!(outcomes.len(), 5);
        let ops = ["insert", "remove", "update", "clear", "load"];
        for (outcome, op) in outcomes.into_iter().zip(ops) {
            match outcome {
                None => assert!(cfg!(debug_assertions), "only debug builds panic"),
                Some(result) => {
                    assert_eq!(result, Err(RBushError::ConcurrentMutation { op }));
                }
            }
        }
        assert_eq!(index.active_readers(), 0);
        assert_eq!(index.all(), before);
        index.read(RTree::check_invariants);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "cannot insert while the index is being read")]
    fn mutation_inside_traversal_panics_in_debug_builds() {
        let index = sample();
        let _ = index.for_each(|&v| {
            ControlFlow::Break(index.insert(Aabb2D::new(100, 100, 101, 101), 1000 + v))
        });
    }

    #[test]
    fn nested_reads_are_allowed() {
        let index = sample();
        let mut pairs = 0;
        let _ = index.for_each_in_extent(Aabb2D::new(0, 0, 2, 1), |&v| {
            assert!(index.active_readers() >= 1);
            let neighbors = index.query(Aabb2D::new(i64::from(v), 0, i64::from(v), 1));
            pairs += neighbors.len();
            let _ = index.for_each(|_| {
                assert_eq!(index.active_readers(), 2);
                ControlFlow::Break(())
            });
            ControlFlow::<()>::Continue(())
        });
        // Values 0..=2 intersect the extent; a line at x = v touches boxes v - 1 and v.
        assert_eq!(pairs, 1 + 2 + 2);
        assert_eq!(index.active_readers(), 0);
    }

    #[test]
    fn mutations_work_between_reads() {
        let index = sample();
        assert_eq!(index.query_point(0, 0), vec![0]);
        index.update(Aabb2D::new(50, 50, 51, 51), &0).unwrap();
        assert!(index.query_point(0, 0).is_empty());
        assert_eq!(index.remove(&0), Ok(Aabb2D::new(50, 50, 51, 51)));
        assert!(!index.contains(&0));
        assert_eq!(index.get(&1), Some(Aabb2D::new(1, 0, 2, 1)));
        index.clear().unwrap();
        assert!(index.is_empty());
        assert_eq!(index.extent(), None);
        assert!(index.all().is_empty());
    }

    #[test]
    fn reader_count_recovers_from_panicking_callback() {
        let index = sample();
        let caught = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = index.for_each(|_| -> ControlFlow<()> { panic!("callback failed") });
        }));
        assert!(caught.is_err());
        assert_eq!(index.active_readers(), 0);
        index.insert(Aabb2D::new(0, 0, 1, 1), 99).unwrap();
        assert_eq!(index.into_inner().len(), 31);
    }
}
