//! Benchmarks for point cloud extraction and voxel downsampling.
//!
//! Run with: cargo bench -p scan-cloud

#![allow(missing_docs, clippy::cast_precision_loss)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::Point3;
use rand::Rng;
use scan_cloud::{ExtractionParams, PointCloudExtractor, voxel_downsample};
use scan_types::{CameraIntrinsics, DepthFrame, PointCloud, PointSource};

fn random_cloud(n: usize) -> PointCloud {
    let mut rng = rand::thread_rng();
    let points = (0..n)
        .map(|_| {
            Point3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(0.5..2.0),
            )
        })
        .collect();
    PointCloud::from_points(points, PointSource::Lidar)
}

fn ramp_frame(width: u32, height: u32) -> DepthFrame {
    let depth = (0..width * height)
        .map(|i| 0.5 + (i % width) as f32 / width as f32)
        .collect();
    DepthFrame::new(width, height, depth, CameraIntrinsics::centered(200.0, width, height))
}

fn bench_voxel_downsample(c: &mut Criterion) {
    let mut group = c.benchmark_group("voxel_downsample");
    for n in [10_000usize, 100_000] {
        let cloud = random_cloud(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &cloud, |b, cloud| {
            b.iter(|| voxel_downsample(black_box(cloud), 0.01));
        });
    }
    group.finish();
}

fn bench_extract_depth(c: &mut Criterion) {
    let frame = ramp_frame(256, 192);
    let mut group = c.benchmark_group("extract_depth");
    for (name, params) in [
        ("default", ExtractionParams::default()),
        ("high_resolution", ExtractionParams::high_resolution()),
    ] {
        let extractor = PointCloudExtractor::new(params);
        group.bench_function(name, |b| b.iter(|| extractor.extract_depth(black_box(&frame))));
    }
    group.finish();
}

criterion_group!(benches, bench_voxel_downsample, bench_extract_depth);
criterion_main!(benches);
