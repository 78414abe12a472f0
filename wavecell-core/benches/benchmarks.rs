use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;
use std::hint::black_box;
use std::sync::Arc;

use wavecell_core::{
    create_computed_state, create_hybrid_state, create_state, ComputedState, PlainState, Runtime,
};

/// A chain of `depth` computed cells hanging off one plain source.
fn build_chain(depth: usize) -> (Arc<Runtime>, PlainState<i32>, ComputedState<i32>) {
    let runtime = Runtime::new();
    let (source, last) = runtime.scope(|| {
        let source = create_state(0);
        let mut last = create_computed_state({
            let source = source.clone();
            move || source.get() + 1
        });
        for _ in 1..depth {
            let prev = last.clone();
            last = create_computed_state(move || prev.get() + 1);
        }
        (source, last)
    });
    runtime.flush_now();
    (runtime, source, last)
}

fn cell_read_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let cell = runtime.scope(|| create_state(42));

    c.bench_function("cell_read", |b| {
        b.iter(|| {
            black_box(cell.get());
        });
    });
}

fn cell_write_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let cell = runtime.scope(|| create_state(0));

    c.bench_function("cell_write", |b| {
        let mut i = 0;
        b.iter(|| {
            cell.set(black_box(i));
            i += 1;
        });
    });
    runtime.flush_now();
}

fn computed_read_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let sum = runtime.scope(|| {
        let a = create_state(5);
        let b = create_state(10);
        create_computed_state(move || a.get() + b.get())
    });
    runtime.flush_now();

    c.bench_function("computed_read", |b| {
        b.iter(|| {
            black_box(sum.get());
        });
    });
}

fn flush_chain_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush_chain");

    for depth in [1usize, 10, 100].iter() {
        let (runtime, source, last) = build_chain(*depth);

        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, _| {
            let mut i = 0;
            b.iter(|| {
                source.set(black_box(i));
                runtime.flush_now();
                black_box(last.get());
                i += 1;
            });
        });
    }
    group.finish();
}

fn flush_diamond_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let (source, join) = runtime.scope(|| {
        let source = create_state(0);
        let left = create_computed_state({
            let source = source.clone();
            move || source.get() + 1
        });
        let right = create_computed_state({
            let source = source.clone();
            move || source.get() * 2
        });
        let join = create_computed_state(move || left.get() + right.get());
        (source, join)
    });
    runtime.flush_now();

    c.bench_function("flush_diamond", |b| {
        let mut i = 0;
        b.iter(|| {
            source.set(black_box(i));
            runtime.flush_now();
            black_box(join.get());
            i += 1;
        });
    });
}

fn subscriber_fanout_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("subscriber_fanout");

    for subscriber_count in [1usize, 10, 100].iter() {
        let runtime = Runtime::new();
        let cell = runtime.scope(|| create_state(0));

        let subscriptions: Vec<_> = (0..*subscriber_count)
            .map(|_| {
                cell.subscribe(|value| {
                    black_box(value);
                })
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    cell.set(black_box(i));
                    runtime.flush_now();
                    i += 1;
                });
            },
        );
        drop(subscriptions);
    }
    group.finish();
}

fn hybrid_override_benchmark(c: &mut Criterion) {
    let runtime = Runtime::new();
    let table = runtime.scope(|| {
        create_hybrid_state(
            || HashMap::from([(String::from("base"), 0)]),
            HashMap::new(),
        )
    });
    runtime.flush_now();

    c.bench_function("hybrid_override", |b| {
        let mut i = 0;
        b.iter(|| {
            table.set(HashMap::from([(String::from("pinned"), black_box(i))]));
            i += 1;
        });
    });
    runtime.flush_now();
}

criterion_group!(
    benches,
    cell_read_benchmark,
    cell_write_benchmark,
    computed_read_benchmark,
    flush_chain_benchmark,
    flush_diamond_benchmark,
    subscriber_fanout_benchmark,
    hybrid_override_benchmark,
);
criterion_main!(benches);
