// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_rbush::{Aabb2D, RTree as RBush, RTreeConfig};

use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};

type Tagged = GeomWithData<Rectangle<[f64; 2]>, u32>;

fn gen_grid_rects(n: usize, cell: f64) -> Vec<(Aabb2D<f64>, u32)> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * cell;
            let y0 = y as f64 * cell;
            out.push((Aabb2D::<f64>::from_xywh(x0, y0, cell, cell), (y * n + x) as u32));
        }
    }
    out
}

fn to_rstar_rects(v: &[(Aabb2D<f64>, u32)]) -> Vec<Tagged> {
    v.iter()
        .map(|(r, id)| {
            GeomWithData::new(
                Rectangle::from_corners([r.min_x, r.min_y], [r.max_x, r.max_y]),
                *id,
            )
        })
        .collect()
}

fn bench_rtree_external_compare_f64(c: &mut Criterion) {
    let mut group = c.benchmark_group("rtree_external_compare_f64");
    for &n in &[64usize, 128] {
        let rects = gen_grid_rects(n, 10.0);
        let window = Aabb2D::<f64>::from_xywh(100.0, 100.0, 400.0, 400.0);
        let envelope = AABB::from_corners(
            [window.min_x, window.min_y],
            [window.max_x, window.max_y],
        );
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_function(format!("rbush_insert_query_n{}", n), |b| {
            b.iter_batched(
                RBush::<f64, u32>::new,
                |mut tree| {
                    for &(r, v) in &rects {
                        let _ = tree.insert(r, v);
                    }
                    black_box(tree.query(window).count());
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_function(format!("rstar_insert_query_n{}", n), |b| {
            b.iter_batched(
                || to_rstar_rects(&rects),
                |rectangles| {
                    let mut tree = RTree::new();
                    for r in rectangles {
                        tree.insert(r);
                    }
                    black_box(tree.locate_in_envelope_intersecting(&envelope).count());
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_function(format!("rbush_bulk_query_n{}", n), |b| {
            b.iter_batched(
                || rects.clone(),
                |entries| {
                    if let Ok(tree) = RBush::bulk_load(RTreeConfig::default(), entries) {
                        black_box(tree.query(window).count());
                    }
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_function(format!("rstar_bulk_query_n{}", n), |b| {
            b.iter_batched(
                || to_rstar_rects(&rects),
                |rectangles| {
                    let tree = RTree::bulk_load(rectangles);
                    black_box(tree.locate_in_envelope_intersecting(&envelope).count());
                },
                BatchSize::SmallInput,
            );
        });

        // Removal by value: the rbush side looks boxes up by value, rstar needs the geometry.
        let rstar_items = to_rstar_rects(&rects);
        group.bench_function(format!("rbush_remove_quarter_n{}", n), |b| {
            b.iter_batched(
                || RBush::bulk_load(RTreeConfig::default(), rects.clone()).unwrap_or_default(),
                |mut tree| {
                    for (_, v) in rects.iter().step_by(4) {
                        let _ = tree.remove(v);
                    }
                    black_box(tree.len());
                },
                BatchSize::SmallInput,
            );
        });
        group.bench_function(format!("rstar_remove_quarter_n{}", n), |b| {
            b.iter_batched(
                || RTree::bulk_load(rstar_items.clone()),
                |mut tree| {
                    for item in rstar_items.iter().step_by(4) {
                        let _ = tree.remove(item);
                    }
                    black_box(tree.size());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rtree_external_compare_f64);
criterion_main!(benches);
