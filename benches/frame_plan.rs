//! Benchmarks for per-frame CPU work and shader generation.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ants::canvas::CanvasSize;
use ants::gpu::shaders::merge_shader_source;
use ants::schedule::{FramePlan, PlanOptions, Roles};
use ants::spawn::spawn_disc;

fn bench_plan_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_plan");

    for scales in [1u32, 5, 15] {
        group.bench_with_input(BenchmarkId::new("build", scales), &scales, |b, &scales| {
            let options = PlanOptions {
                num_blur_scales: scales,
                second_decay: true,
                paused: false,
            };
            b.iter(|| black_box(FramePlan::build(Roles::default(), options)))
        });
    }

    let plan = FramePlan::build(
        Roles::default(),
        PlanOptions {
            num_blur_scales: 15,
            second_decay: true,
            paused: false,
        },
    );
    group.bench_function("validate_15", |b| b.iter(|| black_box(plan.validate())));

    group.finish();
}

fn bench_merge_source(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_shader_source");
    for scales in [1u32, 5, 15] {
        group.bench_with_input(BenchmarkId::from_parameter(scales), &scales, |b, &n| {
            b.iter(|| black_box(merge_shader_source(n)))
        });
    }
    group.finish();
}

fn bench_spawn(c: &mut Criterion) {
    let canvas = CanvasSize::new(1920, 1080);
    c.bench_function("spawn_disc_100k", |b| {
        b.iter(|| black_box(spawn_disc(100_000, canvas, 400.0, Some(1))))
    });
}

criterion_group!(benches, bench_plan_build, bench_merge_source, bench_spawn);
criterion_main!(benches);
