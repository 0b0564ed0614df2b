//! Basic benchmarks for the `block_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use alloc_tracker::Allocator;
use block_pool::BlockPool;
use criterion::{Criterion, criterion_group, criterion_main};
use new_zealand::nz;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

type TestItem = usize;
const TEST_VALUE: TestItem = 1024;

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("bp_basic");

    let allocs_op = allocs.operation("build_empty");
    group.bench_function("build_empty", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(BlockPool::<TestItem>::new()));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("insert_first");
    group.bench_function("insert_first", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(BlockPool::<TestItem>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.insert(black_box(TEST_VALUE)).unwrap());
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("insert_second");
    group.bench_function("insert_second", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(BlockPool::<TestItem>::new)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            // Pre-warm each pool with one item.
            for pool in &mut pools {
                _ = pool.insert(TEST_VALUE).unwrap();
            }

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.insert(black_box(TEST_VALUE)).unwrap());
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("read_one");
    group.bench_function("read_one", |b| {
        b.iter_custom(|iters| {
            let mut pool = BlockPool::<TestItem>::new();
            let key = pool.insert(TEST_VALUE).unwrap();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(pool.get(black_box(key)).unwrap());
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("read_deep");
    group.bench_function("read_deep", |b| {
        b.iter_custom(|iters| {
            // Growing from a tiny first block puts many blocks in front of the last key,
            // exercising the linear index resolution in `get()`.
            let mut pool = BlockPool::<TestItem>::builder()
                .initial_block_capacity(nz!(2))
                .build();

            let mut key = pool.insert(TEST_VALUE).unwrap();
            for _ in 0..10_000 {
                key = pool.insert(TEST_VALUE).unwrap();
            }

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(pool.get(black_box(key)).unwrap());
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("insert_remove_churn");
    group.bench_function("insert_remove_churn", |b| {
        b.iter_custom(|iters| {
            let mut pool = BlockPool::<TestItem>::new();

            // Keep one resident item so the churn below reuses a slot in a live block
            // instead of releasing and reallocating the block on every iteration.
            _ = pool.insert(TEST_VALUE).unwrap();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let key = pool.insert(black_box(TEST_VALUE)).unwrap();
                pool.remove(key).unwrap();
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
