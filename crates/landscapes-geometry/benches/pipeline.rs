// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Criterion benchmarks for the mesh pipeline.
//!
//! Benchmarks:
//!   - terrain simplification of a 257x257 synthetic hill field
//!   - BVH construction over the simplified terrain
//!   - vertical ray queries against that BVH
//!
//! Run with: cargo bench -p landscapes-geometry --bench pipeline

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use landscapes_geometry::{
    BvhOptions, HeightField, SimplifyOptions, SpatialIndex, TerrainSimplifier,
};

const SIZE: usize = 257;

fn hills() -> HeightField {
    let mut samples = Vec::with_capacity(SIZE * SIZE);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let (fx, fy) = (x as f32 / 16.0, y as f32 / 23.0);
            samples.push(40.0 * fx.sin() * fy.cos() + 0.05 * (x + y) as f32);
        }
    }
    HeightField::new(SIZE, SIZE, samples, 2.0).expect("valid field")
}

// ---------------------------------------------------------------------------
// Benchmark: simplification
// ---------------------------------------------------------------------------

fn bench_simplify(c: &mut Criterion) {
    let mut group = c.benchmark_group("terrain_simplify");
    group.sample_size(20);

    let field = hills();
    for tolerance in [0.5, 2.0] {
        let simplifier =
            TerrainSimplifier::new(SimplifyOptions::default().with_max_deviation(tolerance));
        group.bench_function(format!("hills_257_tol_{}", tolerance), |b| {
            b.iter(|| black_box(simplifier.simplify(black_box(&field))));
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: BVH build and query
// ---------------------------------------------------------------------------

fn bench_bvh(c: &mut Criterion) {
    let mut group = c.benchmark_group("terrain_bvh");

    let field = hills();
    let mut mesh = TerrainSimplifier::default()
        .simplify(&field)
        .expect("simplify")
        .mesh;
    mesh.scale_planar(field.cell_size());
    let soup = mesh.triangle_soup();

    group.bench_function("build_leaf_5", |b| {
        b.iter(|| black_box(SpatialIndex::build(black_box(&soup), BvhOptions::default())));
    });

    let index = SpatialIndex::build(&soup, BvhOptions::default()).expect("build");
    group.bench_function("vertical_ray", |b| {
        b.iter(|| black_box(index.intersect_vertical_ray(black_box(123.4), black_box(321.9))));
    });

    group.finish();
}

criterion_group!(benches, bench_simplify, bench_bvh);
criterion_main!(benches);
