// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported by the tree.

use thiserror::Error;

/// Usage errors reported by [`RTree`](crate::RTree) and [`SharedRTree`](crate::SharedRTree).
///
/// Every failing call leaves the tree exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RBushError {
    /// The configured fan-out is too small to build a tree.
    #[error("max_entries must be at least 2, got {max_entries}")]
    InvalidConfiguration {
        /// The rejected `max_entries` value.
        max_entries: usize,
    },

    /// The value is already indexed; remove it first or use `update`.
    #[error("value is already indexed")]
    DuplicateValue,

    /// The value is not indexed.
    #[error("value is not indexed")]
    NotFound,

    /// The bounding box has inverted corners or NaN coordinates.
    #[error("bounding box is inverted or has NaN coordinates")]
    InvalidExtent,

    /// A mutation was attempted while a read traversal of the same index was active.
    ///
    /// This is a programming error: typically an insert or remove issued from inside
    /// a `for_each` callback.
    #[error("cannot {op} while the index is being read")]
    ConcurrentMutation {
        /// The rejected operation.
        op: &'static str,
    },
}

/// Result alias used throughout the crate.
pub type Result<T, E = RBushError> = core::result::Result<T, E>;
