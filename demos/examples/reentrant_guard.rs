// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mutating an index from inside its own traversal.
//!
//! A renderer visits features through a `SharedRTree`. Edits found during the walk are
//! deferred and applied once it is over. A careless callback that edits mid-walk is
//! caught: debug builds panic, release builds get `RBushError::ConcurrentMutation`.
//!
//! Run:
//! - `cargo run -p understory_rbush_demos --example reentrant_guard`
//! - `cargo run -p understory_rbush_demos --example reentrant_guard --release`

use core::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};

use tracing::{info, warn};
use understory_rbush::{Aabb2D, RBushError, SharedRTree};

fn main() {
    tracing_subscriber::fmt::init();

    let index: SharedRTree<f64, u32> = SharedRTree::default();
    for i in 0..8_u32 {
        let x = f64::from(i) * 10.0;
        if let Err(err) = index.insert(Aabb2D::new(x, 0.0, x + 5.0, 5.0), i) {
            warn!(%err, "insert failed");
        }
    }

    // The right way: collect during the walk, edit afterwards.
    let mut deferred = Vec::new();
    let _ = index.for_each(|&id| {
        if id % 3 == 0 {
            deferred.push(id);
        }
        ControlFlow::<()>::Continue(())
    });
    for id in deferred {
        match index.remove(&id) {
            Ok(bbox) => info!(id, ?bbox, "deferred edit applied"),
            Err(err) => warn!(id, %err, "deferred edit failed"),
        }
    }

    // The wrong way: edit from inside the callback.
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
        index.for_each(|&id| ControlFlow::Break(index.remove(&id)))
    }));
    match attempt {
        Ok(ControlFlow::Break(Err(RBushError::ConcurrentMutation { op }))) => {
            info!(op, "edit rejected during traversal");
        }
        Ok(other) => warn!(?other, "unexpected result"),
        Err(_) => info!("edit during traversal panicked (debug build)"),
    }

    info!(
        len = index.len(),
        readers = index.active_readers(),
        "traversal finished"
    );
}
