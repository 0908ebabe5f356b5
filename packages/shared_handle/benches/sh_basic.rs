//! Basic benchmarks for the `shared_handle` package.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::fmt::Display;
use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use shared_handle::{Shared, define_shared_dyn_cast, dynamic_cast, try_dynamic_cast};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

define_shared_dyn_cast!(Display);

type TestItem = usize;
const TEST_VALUE: TestItem = 1024;

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("sh_lifecycle");

    group.bench_function("new_drop", |b| {
        b.iter(|| {
            drop(black_box(Shared::new(TEST_VALUE)));
        });
    });

    let original = Shared::new(TEST_VALUE);

    group.bench_function("clone_drop", |b| {
        b.iter(|| {
            drop(black_box(original.clone()));
        });
    });

    group.bench_function("clone_ten_thousand", |b| {
        b.iter(|| {
            (0..10_000)
                .map(|_| original.clone())
                .collect::<Vec<_>>()
        });
    });

    group.finish();

    let mut cast_group = c.benchmark_group("sh_cast");

    let display = original.clone().cast_display();

    cast_group.bench_function("upcast", |b| {
        b.iter(|| black_box(original.clone()).cast_display());
    });

    cast_group.bench_function("downcast_success", |b| {
        b.iter(|| dynamic_cast::<TestItem, _>(black_box(&display)));
    });

    cast_group.bench_function("downcast_failure", |b| {
        b.iter(|| dynamic_cast::<u8, _>(black_box(&display)));
    });

    cast_group.bench_function("try_downcast_failure", |b| {
        b.iter(|| try_dynamic_cast::<u8, _>(black_box(&display)));
    });

    cast_group.finish();
}
