// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Understory RBush: insert, update, remove, and query.

use understory_rbush::{Aabb2D, RTree};

fn main() {
    let mut tree: RTree<i64, u32> = RTree::new();
    tree.insert(Aabb2D::new(0, 0, 10, 10), 1).unwrap();
    tree.insert(Aabb2D::new(5, 5, 15, 15), 2).unwrap();

    // Query a point
    let hits: Vec<_> = tree.query_point(6, 6).collect();
    println!("hits at (6,6): {:?}", hits);

    // Move box 1
    tree.update(Aabb2D::new(20, 0, 30, 10), &1).unwrap();
    println!("extent after move: {:?}", tree.extent());

    let removed = tree.remove(&2).unwrap();
    println!("removed 2 at {:?}; {} left", removed, tree.len());
    println!("{:?}", tree);
}
