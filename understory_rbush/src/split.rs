// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Quadratic node split.
//!
//! Guttman's quadratic heuristic: seed the two groups with the pair of children that
//! would waste the most area if kept together, then repeatedly take the remaining
//! child with the strongest preference for one group and add it to the group that
//! grows least. A group that needs every remaining child to reach the minimum fill
//! takes them all.

use alloc::vec::Vec;

use crate::node::RChild;
use crate::types::{Aabb2D, Scalar, area, enlargement};

/// The two halves of a split node.
#[derive(Debug)]
pub(crate) struct Split<T> {
    pub(crate) left: Vec<RChild>,
    pub(crate) left_bbox: Aabb2D<T>,
    pub(crate) right: Vec<RChild>,
    pub(crate) right_bbox: Aabb2D<T>,
}

struct Group<T> {
    children: Vec<RChild>,
    bbox: Aabb2D<T>,
}

impl<T: Scalar> Group<T> {
    fn seeded(child: RChild, bbox: Aabb2D<T>, capacity: usize) -> Self {
        let mut children = Vec::with_capacity(capacity);
        children.push(child);
        Self { children, bbox }
    }

    fn push(&mut self, child: RChild, bbox: &Aabb2D<T>) {
        self.children.push(child);
        self.bbox = self.bbox.union(bbox);
    }
}

/// Split `items` (children paired with their boxes) into two groups of at least
/// `min_fill` children each. Requires `items.len() >= 2 * min_fill` and at least two items.
pub(crate) fn quadratic_split<T: Scalar>(
    mut items: Vec<(RChild, Aabb2D<T>)>,
    min_fill: usize,
) -> Split<T> {
    debug_assert!(items.len() >= 2, "split requires at least two children");
    debug_assert!(items.len() >= 2 * min_fill, "split cannot honor the minimum fill");

    let (s1, s2) = pick_seeds(&items);
    // Remove the higher index first so the lower one stays valid.
    let (c2, b2) = items.swap_remove(s2);
    let (c1, b1) = items.swap_remove(s1);
    let capacity = items.len() + 1;
    let mut g1 = Group::seeded(c1, b1, capacity);
    let mut g2 = Group::seeded(c2, b2, capacity);

    while !items.is_empty() {
        if g1.children.len() + items.len() <= min_fill {
            for (c, b) in items.drain(..) {
                g1.push(c, &b);
            }
            break;
        }
        if g2.children.len() + items.len() <= min_fill {
            for (c, b) in items.drain(..) {
                g2.push(c, &b);
            }
            break;
        }

        let (next, d1, d2) = pick_next(&items, &g1.bbox, &g2.bbox);
        let (child, bbox) = items.swap_remove(next);
        if prefers_first(d1, d2, &g1, &g2) {
            g1.push(child, &bbox);
        } else {
            g2.push(child, &bbox);
        }
    }

    Split {
        left: g1.children,
        left_bbox: g1.bbox,
        right: g2.children,
        right_bbox: g2.bbox,
    }
}

/// The pair whose covering box wastes the most area. Returns `(lower, higher)` indices.
fn pick_seeds<T: Scalar>(items: &[(RChild, Aabb2D<T>)]) -> (usize, usize) {
    let mut best = (0, 1);
    let mut worst_waste: Option<T::Acc> = None;
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let (a, b) = (&items[i].1, &items[j].1);
            let waste = area(&a.union(b)) - area(a) - area(b);
            if worst_waste.map(|w| waste > w).unwrap_or(true) {
                worst_waste = Some(waste);
                best = (i, j);
            }
        }
    }
    best
}

/// The item with the largest difference between its two enlargement costs.
fn pick_next<T: Scalar>(
    items: &[(RChild, Aabb2D<T>)],
    g1: &Aabb2D<T>,
    g2: &Aabb2D<T>,
) -> (usize, T::Acc, T::Acc) {
    let mut best: Option<(usize, T::Acc, T::Acc, T::Acc)> = None;
    for (i, (_, bbox)) in items.iter().enumerate() {
        let d1 = enlargement(g1, bbox);
        let d2 = enlargement(g2, bbox);
        let diff = if d1 > d2 { d1 - d2 } else { d2 - d1 };
        if best.map(|(_, _, _, bd)| diff > bd).unwrap_or(true) {
            best = Some((i, d1, d2, diff));
        }
    }
    let (i, d1, d2, _) = best.expect("pick_next on an empty list");
    (i, d1, d2)
}

/// Smaller enlargement wins, then smaller area, then fewer children.
fn prefers_first<T: Scalar>(d1: T::Acc, d2: T::Acc, g1: &Group<T>, g2: &Group<T>) -> bool {
    if d1 < d2 {
        return true;
    }
    if d2 < d1 {
        return false;
    }
    let (a1, a2) = (area(&g1.bbox), area(&g2.bbox));
    if a1 < a2 {
        return true;
    }
    if a2 < a1 {
        return false;
    }
    g1.children.len() <= g2.children.len()
}
