// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree configuration.

use crate::error::{RBushError, Result};

/// Fan-out configuration for an [`RTree`](crate::RTree).
///
/// Only `max_entries` is configurable; the minimum fill used by splits and by
/// underflow handling on removal is derived from it (see [`RTreeConfig::min_entries`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RTreeConfig {
    /// Maximum number of children of any node before it splits. Must be at least 2.
    pub max_entries: usize,
}

impl RTreeConfig {
    /// Fan-out used by [`RTreeConfig::default`].
    pub const DEFAULT_MAX_ENTRIES: usize = 9;

    /// Create a configuration with the given maximum fan-out. Not validated until use.
    pub const fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }

    /// Check that the configuration can build a tree.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries < 2 {
            return Err(RBushError::InvalidConfiguration {
                max_entries: self.max_entries,
            });
        }
        Ok(())
    }

    /// Minimum number of children of a non-root node.
    ///
    /// `⌈0.4 × max_entries⌉`, at least 2, but never more than half of an overfull
    /// node (`max_entries + 1` children) so that every split can honor it.
    pub fn min_entries(&self) -> usize {
        let derived = (self.max_entries * 2).div_ceil(5).max(2);
        derived.min(self.max_entries.div_ceil(2)).max(1)
    }
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ENTRIES)
    }
}
