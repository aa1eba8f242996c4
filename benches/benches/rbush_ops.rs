// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use understory_rbush::{Aabb2D, RTree, RTreeConfig, RTreeF32, RTreeI64, SharedRTree};

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

fn gen_random_rects(count: usize, extent: f64, size: f64, seed: u64) -> Vec<(Aabb2D<f64>, u32)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let x0 = rng.random_range(0.0..extent - size);
            let y0 = rng.random_range(0.0..extent - size);
            let w = rng.random_range(1.0..size);
            let h = rng.random_range(1.0..size);
            (Aabb2D::<f64>::from_xywh(x0, y0, w, h), i as u32)
        })
        .collect()
}

fn gen_clustered_rects(n_clusters: usize, per_cluster: usize, spread: f64) -> Vec<(Aabb2D<f64>, u32)> {
    let mut rng = StdRng::seed_from_u64(0xC1A5_7E55_9999_ABCD);
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    for _ in 0..n_clusters {
        let cx = rng.random_range(0.0..2000.0);
        let cy = rng.random_range(0.0..2000.0);
        for _ in 0..per_cluster {
            let x0 = cx + rng.random_range(-spread..spread);
            let y0 = cy + rng.random_range(-spread..spread);
            let id = out.len() as u32;
            out.push((Aabb2D::<f64>::from_xywh(x0, y0, 4.0, 4.0), id));
        }
    }
    out
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("rbush_build_f64");
    for &n in &[64_usize, 128] {
        let rects = gen_grid_rects(n, 10.0);
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_function(format!("insert_n{}", n), |b| {
            b.iter_batched(
                RTree::<f64, u32>::new,
                |mut tree| {
                    for &(r, v) in &rects {
                        let _ = tree.insert(r, v);
                    }
                    black_box(tree.height());
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_function(format!("bulk_load_n{}", n), |b| {
            b.iter_batched(
                || rects.clone(),
                |entries| {
                    let tree = RTree::bulk_load(RTreeConfig::default(), entries);
                    black_box(tree.map(|t| t.height()).unwrap_or(0));
                },
                BatchSize::SmallInput,
            );
        });

        // Half the data loaded up front, then the second half merged in.
        let (first, second) = rects.split_at(rects.len() / 2);
        group.bench_function(format!("load_merge_n{}", n), |b| {
            b.iter_batched(
                || {
                    let tree = RTree::bulk_load(RTreeConfig::default(), first.to_vec())
                        .unwrap_or_default();
                    (tree, second.to_vec())
                },
                |(mut tree, batch)| {
                    let _ = tree.load(batch);
                    black_box(tree.len());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("rbush_query_f64");
    let datasets = [
        ("grid", gen_grid_rects(128, 10.0)),
        ("random", gen_random_rects(16_384, 2000.0, 20.0, 0xCAFE_F00D_DEAD_BEEF)),
        ("clustered", gen_clustered_rects(32, 512, 40.0)),
    ];
    let window = Aabb2D::<f64>::from_xywh(300.0, 300.0, 200.0, 200.0);
    for (name, rects) in datasets {
        for max_entries in [4_usize, 9, 16] {
            let Ok(tree) = RTree::bulk_load(RTreeConfig::new(max_entries), rects.clone()) else {
                continue;
            };
            group.bench_function(format!("{}_rect_m{}", name, max_entries), |b| {
                b.iter(|| black_box(tree.query(window).count()));
            });
            group.bench_function(format!("{}_point_m{}", name, max_entries), |b| {
                b.iter(|| black_box(tree.query_point(401.0, 401.0).count()));
            });
            group.bench_function(format!("{}_for_each_in_extent_m{}", name, max_entries), |b| {
                b.iter(|| {
                    let mut hits = 0_usize;
                    let _ = tree.for_each_in_extent(window, |_| {
                        hits += 1;
                        core::ops::ControlFlow::<()>::Continue(())
                    });
                    black_box(hits)
                });
            });
        }
    }
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("rbush_churn_f64");
    let rects = gen_random_rects(8192, 2000.0, 20.0, 0x5EED);
    let moves = gen_random_rects(1024, 2000.0, 20.0, 0xFACE);
    let base = RTree::bulk_load(RTreeConfig::default(), rects.clone()).unwrap_or_default();

    group.bench_function("update_1024", |b| {
        b.iter_batched(
            || base.clone(),
            |mut tree| {
                for (i, &(r, _)) in moves.iter().enumerate() {
                    let _ = tree.update(r, &(i as u32));
                }
                black_box(tree.len());
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("remove_half", |b| {
        b.iter_batched(
            || base.clone(),
            |mut tree| {
                for (_, v) in rects.iter().step_by(2) {
                    let _ = tree.remove(v);
                }
                black_box(tree.len());
            },
            BatchSize::SmallInput,
        );
    });

    // Reader bookkeeping overhead of the shared handle against the owned tree.
    let shared = SharedRTree::from(base.clone());
    let window = Aabb2D::<f64>::from_xywh(500.0, 500.0, 100.0, 100.0);
    group.bench_function("shared_query", |b| {
        b.iter(|| black_box(shared.query(window).len()));
    });
    group.bench_function("owned_query", |b| {
        b.iter(|| black_box(base.query(window).count()));
    });
    group.finish();
}

fn bench_scalars(c: &mut Criterion) {
    let mut group = c.benchmark_group("rbush_scalars");
    let n = 128_usize;
    let f32_rects: Vec<_> = (0..n * n)
        .map(|i| {
            let (x, y) = ((i % n) as f32 * 10.0, (i / n) as f32 * 10.0);
            (Aabb2D::<f32>::from_xywh(x, y, 10.0, 10.0), i as u32)
        })
        .collect();
    let i64_rects: Vec<_> = (0..n * n)
        .map(|i| {
            let (x, y) = ((i % n) as i64 * 10, (i / n) as i64 * 10);
            (Aabb2D::<i64>::from_xywh(x, y, 10, 10), i as u32)
        })
        .collect();

    group.bench_function("bulk_load_query_f32", |b| {
        b.iter_batched(
            || f32_rects.clone(),
            |entries| {
                if let Ok(tree) = RTreeF32::bulk_load(RTreeConfig::default(), entries) {
                    black_box(tree.query(Aabb2D::<f32>::from_xywh(100.0, 100.0, 400.0, 400.0)).count());
                }
            },
            BatchSize::SmallInput,
        );
    });
    group.bench_function("bulk_load_query_i64", |b| {
        b.iter_batched(
            || i64_rects.clone(),
            |entries| {
                if let Ok(tree) = RTreeI64::bulk_load(RTreeConfig::default(), entries) {
                    black_box(tree.query(Aabb2D::<i64>::from_xywh(100, 100, 400, 400)).count());
                }
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_query, bench_churn, bench_scalars);
criterion_main!(benches);
