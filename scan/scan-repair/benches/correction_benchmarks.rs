//! Benchmarks for mesh correction.
//!
//! Run with: cargo bench -p scan-repair

#![allow(missing_docs, clippy::cast_precision_loss)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::Point3;
use scan_repair::{
    CorrectionParams, MeshCorrectionEngine, fill_small_holes, laplacian_smooth, remove_degenerate_faces,
};
use scan_types::{CancellationToken, PatchId, SurfacePatch, WorkerPool};

/// A wavy `n × n` quad grid, triangulated, with every 7th face removed.
fn wavy_grid(n: u32) -> SurfacePatch {
    let mut vertices = Vec::with_capacity(((n + 1) * (n + 1)) as usize);
    for y in 0..=n {
        for x in 0..=n {
            let (fx, fy) = (f64::from(x) * 0.01, f64::from(y) * 0.01);
            vertices.push(Point3::new(fx, fy, (fx * 20.0).sin() * (fy * 20.0).cos() * 0.01));
        }
    }
    let mut faces = Vec::with_capacity((n * n * 2) as usize);
    for y in 0..n {
        for x in 0..n {
            let i = y * (n + 1) + x;
            faces.push([i, i + 1, i + n + 2]);
            faces.push([i, i + n + 2, i + n + 1]);
        }
    }
    let faces = faces
        .into_iter()
        .enumerate()
        .filter_map(|(k, f)| (k % 7 != 3).then_some(f))
        .collect();
    SurfacePatch::new(PatchId(1), vertices, faces)
}

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("correction_stages");
    for n in [50u32, 200] {
        let patch = wavy_grid(n);
        group.throughput(Throughput::Elements(patch.vertex_count() as u64));
        group.bench_with_input(BenchmarkId::new("degenerate", n), &patch, |b, p| {
            b.iter(|| remove_degenerate_faces(black_box(p), 1e-10));
        });
        group.bench_with_input(BenchmarkId::new("laplacian", n), &patch, |b, p| {
            b.iter(|| laplacian_smooth(black_box(p), 2, 0.5));
        });
        group.bench_with_input(BenchmarkId::new("fill_holes", n), &patch, |b, p| {
            b.iter(|| fill_small_holes(black_box(p), 10));
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let patches: Vec<SurfacePatch> = (0..16)
        .map(|i| SurfacePatch {
            id: PatchId(i),
            ..wavy_grid(60)
        })
        .collect();
    let mut group = c.benchmark_group("correct_batch");
    for (name, pool) in [("sequential", WorkerPool::sequential()), ("global", WorkerPool::global())] {
        let engine = MeshCorrectionEngine::new(CorrectionParams::default()).with_pool(pool);
        let token = CancellationToken::new();
        group.bench_function(name, |b| b.iter(|| engine.correct_batch(black_box(&patches), &token)));
    }
    group.finish();
}

criterion_group!(benches, bench_stages, bench_pipeline);
criterion_main!(benches);
