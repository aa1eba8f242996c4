// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_rbush --heading-base-level=0

//! Understory RBush: a mutable, bulk-loadable 2D R-tree.
//!
//! Understory RBush maps axis-aligned bounding boxes (AABBs) to opaque values and answers
//! "what overlaps this rectangle?" quickly.
//!
//! - Insert, update, and remove boxes one value at a time; values are their own keys.
//! - Bulk load large batches with Sort-Tile-Recursive packing, into an empty or a populated tree.
//! - Query by rectangle or point, or visit values with early exit through [`ControlFlow`].
//!
//! It is generic over the scalar type `T` (`f32`, `f64`, `i64`) and does not depend on any
//! geometry crate. Area metrics use widened accumulators (f32→f64, f64→f64, i64→i128).
//!
//! # Example
//!
//! ```rust
//! use understory_rbush::{Aabb2D, RTree};
//!
//! let mut tree: RTree<f64, &str> = RTree::new();
//! tree.insert(Aabb2D::new(0.0, 0.0, 10.0, 10.0), "a").unwrap();
//! tree.insert(Aabb2D::new(20.0, 20.0, 30.0, 30.0), "b").unwrap();
//!
//! let hits: Vec<_> = tree.query(Aabb2D::new(5.0, 5.0, 25.0, 25.0)).collect();
//! assert_eq!(hits.len(), 2);
//!
//! tree.update(Aabb2D::new(100.0, 100.0, 110.0, 110.0), &"b").unwrap();
//! assert_eq!(tree.query_point(25.0, 25.0).count(), 0);
//! assert_eq!(tree.extent(), Some(Aabb2D::new(0.0, 0.0, 110.0, 110.0)));
//! ```
//!
//! Bulk loading packs a batch in one pass and is much faster than inserting one by one:
//!
//! ```rust
//! use understory_rbush::{Aabb2D, RTreeConfig, RTreeI64};
//!
//! let boxes = (0..1000_i64).map(|i| (Aabb2D::new(i, i, i + 1, i + 1), i));
//! let tree = RTreeI64::bulk_load(RTreeConfig::new(16), boxes).unwrap();
//! assert_eq!(tree.len(), 1000);
//! assert_eq!(tree.query(Aabb2D::new(10, 10, 12, 12)).count(), 4);
//! ```
//!
//! ## Mutation during reads
//!
//! [`RTree`] takes `&mut self` for every mutation, so mutating it from inside its own
//! traversal does not compile. When callbacks need shared access to the index, wrap it in
//! a [`SharedRTree`]: it counts active readers and refuses mutations while any read is
//! in progress. Debug builds panic on such a mutation; release builds return
//! [`RBushError::ConcurrentMutation`]. The tree is left unchanged either way.
//!
//! ### Float semantics
//!
//! Boxes with NaN coordinates or `min > max` are rejected with [`RBushError::InvalidExtent`].
//! Edges are inclusive: boxes that only touch still intersect.
//!
//! ## Features
//!
//! - `serde`: `Serialize`/`Deserialize` for [`Aabb2D`] and [`RTreeConfig`].
//! - `kurbo`: conversions between `kurbo::Rect` and `Aabb2D<f64>`.
//! - `std` (default) / `libm`: forwarded to Kurbo; disable `std` for `no_std` builds.
//!
//! [`ControlFlow`]: core::ops::ControlFlow

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod bulk;
pub mod config;
pub mod error;
mod node;
pub mod rtree;
pub mod shared;
mod split;
pub mod types;

pub use config::RTreeConfig;
pub use error::{RBushError, Result};
pub use rtree::{Query, RTree, RTreeF32, RTreeF64, RTreeI64};
pub use shared::SharedRTree;
pub use types::{Aabb2D, Scalar, area, enlargement};
