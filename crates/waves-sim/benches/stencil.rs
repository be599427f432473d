//! Stencil step benchmarks.
//!
//! Measures a full `iterate()` (both passes plus source injection) for planar
//! and volumetric grids, and the bare fork/join cost of the worker pool.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use waves_core::{partition, WorkerPool};
use waves_sim::prelude::*;

fn scene_with_source(
    width: usize,
    height: usize,
    depth: usize,
    stencil: Stencil,
) -> SceneDescription {
    let mut scene = SceneDescription::volume("bench", width, height, depth);
    scene.params.stencil = stencil;
    scene.emitters.push(Emitter::new(
        Region::centered([width / 2, height / 2, depth / 2], 4, depth == 1),
        SquareWave::default(),
    ));
    scene
}

/// Benchmark one step on planar grids
fn bench_planar_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step/planar");
    let threads = WorkerPool::available_parallelism();

    for size in [256usize, 512, 1024] {
        for stencil in [Stencil::Axis, Stencil::Diagonal] {
            let mut sim =
                WavefieldSimulation::new(scene_with_source(size, size, 1, stencil), threads)
                    .expect("simulation");
            sim.initialize(None);
            group.throughput(Throughput::Elements((size * size) as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("{stencil:?}"), size),
                &size,
                |b, _| {
                    b.iter(|| black_box(sim.iterate()));
                },
            );
        }
    }

    group.finish();
}

/// Benchmark one step on volumetric grids
fn bench_volume_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step/volume");
    let threads = WorkerPool::available_parallelism();

    for size in [32usize, 64, 128] {
        let mut sim = WavefieldSimulation::new(
            scene_with_source(size, size, size, Stencil::Axis),
            threads,
        )
        .expect("simulation");
        sim.initialize(None);
        group.throughput(Throughput::Elements((size * size * size) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(sim.iterate()));
        });
    }

    group.finish();
}

/// Benchmark fork/join round trips
fn bench_pool_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool/run");

    for workers in [1usize, 2, 4, 8] {
        let mut pool = WorkerPool::new(workers).expect("pool");
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| {
                pool.run(|index, count| {
                    black_box(partition(4_096, index, count));
                });
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_planar_step,
    bench_volume_step,
    bench_pool_run
);
criterion_main!(benches);
