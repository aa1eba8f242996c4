// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sort-Tile-Recursive packing for bulk loads.
//!
//! Each level is built the same way: sort the items by x centroid, cut them into
//! `⌈√k⌉` vertical slices (where `k` is the number of parents needed), sort each slice
//! by y centroid and pack consecutive runs into parents. Levels are stacked until a
//! single node remains, so every leaf ends up at the same depth.
//!
//! Run lengths are spread evenly instead of filling parents greedily, which keeps
//! every node except the root at or above the minimum fill.

use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::node::{Arena, NodeIdx, RChild, RNode};
use crate::types::{Aabb2D, Scalar, centroid_x, centroid_y};

/// Build a packed subtree from `items` inside `arena` and return its root.
pub(crate) fn build<T: Scalar, V>(
    arena: &mut Arena<T, V>,
    items: Vec<(RChild, Aabb2D<T>)>,
    max_children: usize,
) -> Option<NodeIdx> {
    if items.is_empty() {
        return None;
    }
    let mut level = items;
    let mut height = 1;
    loop {
        level = pack_level(arena, level, height, max_children);
        if let [(RChild::Node(root), _)] = level.as_slice() {
            return Some(*root);
        }
        height += 1;
    }
}

/// Pack one level of items into parents of the given `height`.
fn pack_level<T: Scalar, V>(
    arena: &mut Arena<T, V>,
    mut items: Vec<(RChild, Aabb2D<T>)>,
    height: usize,
    max_children: usize,
) -> Vec<(RChild, Aabb2D<T>)> {
    let n = items.len();
    let groups = n.div_ceil(max_children);
    let mut slices = 1_usize;
    while slices * slices < groups {
        slices += 1;
    }

    items.sort_by(|a, b| {
        centroid_x(&a.1)
            .partial_cmp(&centroid_x(&b.1))
            .unwrap_or(Ordering::Equal)
    });

    let mut sizes = even_split(n, groups);
    let mut parents = Vec::with_capacity(groups);
    let mut rest = &mut items[..];
    for groups_in_slice in even_split(groups, slices) {
        let run: Vec<usize> = sizes.by_ref().take(groups_in_slice).collect();
        let slice_len = run.iter().sum();
        let (slice, tail) = rest.split_at_mut(slice_len);
        rest = tail;
        slice.sort_by(|a, b| {
            centroid_y(&a.1)
                .partial_cmp(&centroid_y(&b.1))
                .unwrap_or(Ordering::Equal)
        });
        let mut start = 0;
        for len in run {
            let chunk = &slice[start..start + len];
            start += len;
            let children: Vec<RChild> = chunk.iter().map(|(c, _)| *c).collect();
            let bbox = chunk[1..]
                .iter()
                .fold(chunk[0].1, |acc, (_, b)| acc.union(b));
            let idx = arena.alloc_node(RNode {
                bbox,
                height,
                children,
            });
            parents.push((RChild::Node(idx), bbox));
        }
    }
    parents
}

/// `parts` sizes summing to `total`, differing by at most one, larger first.
fn even_split(total: usize, parts: usize) -> impl Iterator<Item = usize> {
    let base = total / parts;
    let extra = total % parts;
    (0..parts).map(move |i| base + usize::from(i < extra))
}
