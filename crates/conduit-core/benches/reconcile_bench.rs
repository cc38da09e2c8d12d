//! Criterion benchmarks for topology reconciliation.
//!
//! Three benchmark groups:
//! - `split`: cut a 500-block run carrying 2000 movers in the middle
//! - `merge`: bridge two 250-block runs carrying 1000 movers each
//! - `save`: freeze and resume 5000 movers

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use conduit_core::geometry::BlockPos;
use conduit_core::network::{ChangeReason, TopologyGraph};
use conduit_core::registry::TransportRegistry;
use conduit_core::test_utils::*;

// ===========================================================================
// Builders
// ===========================================================================

/// A registry over pipe runs covering `xs`, with `movers` stationary movers
/// spread evenly over the blocks of each run.
fn build_registry(runs: &[std::ops::Range<i32>], movers: usize) -> TransportRegistry {
    let ty = item_pipe();
    let mut registry = recording_registry(&ty);
    registry
        .handler_mut::<RecordingHandler>(&ty)
        .unwrap()
        .reroute_on_transfer = true;

    for run in runs {
        registry
            .mutate_graph(&ty, |g| g.add_nodes(&straight_run(run.clone()), ChangeReason::WorldChange))
            .unwrap();
        let width = (run.end - run.start) as usize;
        for i in 0..movers {
            let x = run.start + (i % width) as i32;
            let component = registry
                .graph(&ty)
                .and_then(|g| g.component_at(BlockPos::new(x, 0, 0)))
                .unwrap();
            let at = x as f64;
            registry
                .route_mover(&ty, component, along_x(at, at + 0.25, 100), 1_000_000)
                .unwrap();
        }
    }
    registry
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");
    group.sample_size(30);

    group.bench_function("500_blocks_2000_movers", |b| {
        b.iter_batched(
            || build_registry(&[0..500], 2000),
            |mut registry| {
                registry
                    .mutate_graph(&item_pipe(), |g| g.remove_node(pipe(250), ChangeReason::WorldChange))
                    .unwrap();
                registry
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    group.sample_size(30);

    group.bench_function("2x250_blocks_1000_movers_each", |b| {
        b.iter_batched(
            || build_registry(&[0..250, 251..501], 1000),
            |mut registry| {
                registry
                    .mutate_graph(&item_pipe(), |g| g.add_node(pipe(250), ChangeReason::WorldChange))
                    .unwrap();
                registry
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("save");
    group.sample_size(30);

    group.bench_function("freeze_resume_5000_movers", |b| {
        b.iter_batched(
            || build_registry(&[0..100], 5000),
            |mut registry| {
                let frozen = registry.pre_save();
                registry.post_save();
                (registry, frozen)
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_split, bench_merge, bench_save);
criterion_main!(benches);
