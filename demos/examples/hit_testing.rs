// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hit testing map features with an R-tree.
//!
//! Features are bulk loaded from kurbo rectangles, moved, and picked by point and by
//! a drag rectangle. Set `RUST_LOG=understory_rbush=debug` to see the index's own events.
//!
//! Run:
//! - `cargo run -p understory_rbush_demos --example hit_testing`

use core::ops::ControlFlow;

use kurbo::{Point, Rect};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use understory_rbush::{Aabb2D, RTree, RTreeConfig};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct FeatureId(u32);

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

fn main() {
    init_tracing();

    // A 40×25 grid of "buildings" with a little jitter.
    let features = (0..1000_u32).map(|i| {
        let x = f64::from(i % 40) * 25.0 + f64::from(i % 3);
        let y = f64::from(i / 40) * 25.0 + f64::from(i % 5);
        let rect = Rect::new(x, y, x + 18.0, y + 12.0);
        (Aabb2D::from(rect), FeatureId(i))
    });
    let mut index = match RTree::bulk_load(RTreeConfig::new(16), features) {
        Ok(index) => index,
        Err(err) => {
            tracing::error!(%err, "failed to build the feature index");
            return;
        }
    };
    info!(len = index.len(), height = index.height(), "index built");

    let click = Point::new(130.0, 60.0);
    let picked: Vec<FeatureId> = index.query_point(click.x, click.y).copied().collect();
    info!(?click, ?picked, "click");

    // Drag a feature somewhere else; the old location no longer hits.
    if let Some(&first) = picked.first() {
        let moved = Rect::from_origin_size((2000.0, 2000.0), (18.0, 12.0));
        if let Err(err) = index.update(moved.into(), &first) {
            tracing::warn!(%err, "move failed");
        }
        info!(
            hits_at_click = index.query_point(click.x, click.y).count(),
            extent = ?index.extent().map(Rect::from),
            "feature moved"
        );
    }

    // Rubber-band selection, stopping at the first feature with an even id.
    let band = Rect::new(300.0, 300.0, 360.0, 340.0);
    let selected: Vec<_> = index.query(band.into()).collect();
    info!(count = selected.len(), "rubber-band selection");
    let first_even = index.for_each_in_extent(band.into(), |id| {
        if id.0 % 2 == 0 {
            ControlFlow::Break(*id)
        } else {
            ControlFlow::Continue(())
        }
    });
    info!(?first_even, "first even feature in band");

    // Deleting the selection.
    let removed: Vec<FeatureId> = selected.into_iter().copied().collect();
    for id in &removed {
        if let Err(err) = index.remove(id) {
            tracing::warn!(?id, %err, "delete failed");
        }
    }
    info!(removed = removed.len(), remaining = index.len(), "selection deleted");
}
