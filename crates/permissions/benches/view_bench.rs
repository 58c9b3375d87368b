//! Benchmarks for element access and enumeration on permission views.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use grantview_engine::{ExpressionCompiler, MemoryEngine};
use grantview_permissions::{
    permission_table, AccessLevel, NotificationContext, PermissionResults, PermissionValue,
    SortDescriptor, SortKey, ViewConfig,
};
use std::sync::Arc;

fn populate(count: usize) -> (MemoryEngine, PermissionResults) {
    let users = ["alice", "bob", "carol", "dave", "erin"];
    let engine = MemoryEngine::new(permission_table());
    engine
        .advance(|batch| {
            for i in 0..count {
                let value = PermissionValue::new(
                    format!("/~/realm{}", (i * 7919) % count),
                    users[i % users.len()],
                    AccessLevel::from_i32((i % 4) as i32).unwrap_or_default(),
                    i as i64,
                );
                batch.insert(value.to_values())?;
            }
            Ok(())
        })
        .unwrap();
    let view = PermissionResults::open(&engine, NotificationContext::new("bench")).unwrap();
    (engine, view)
}

/// Benchmark: indexed access on a plain and a sorted view
fn view_at_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_at");

    for count in [100usize, 1000, 10000].iter() {
        let (_engine, view) = populate(*count);
        let sorted = view
            .sorted(&[
                SortDescriptor::by(SortKey::Path, true),
                SortDescriptor::by(SortKey::UpdatedAt, false),
            ])
            .unwrap();

        group.bench_with_input(BenchmarkId::new("unsorted", count), count, |b, &count| {
            b.iter(|| {
                for index in (0..count).step_by(count / 100) {
                    black_box(view.at(index).unwrap());
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("sorted", count), count, |b, &count| {
            b.iter(|| {
                for index in (0..count).step_by(count / 100) {
                    black_box(sorted.at(index).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark: full enumeration with different batch sizes
fn view_enumerate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_enumerate");
    let (engine, view) = populate(10000);

    group.bench_function("iter", |b| {
        b.iter(|| {
            let mut n = 0;
            for value in &view {
                black_box(value.unwrap());
                n += 1;
            }
            black_box(n)
        });
    });

    for batch in [1usize, 16, 256].iter() {
        group.bench_with_input(BenchmarkId::new("batch", batch), batch, |b, &batch| {
            let view = PermissionResults::open_with(
                &engine,
                Arc::new(ExpressionCompiler),
                NotificationContext::new("bench"),
                ViewConfig::new().enumeration_batch(batch),
            )
            .unwrap();
            let mut buffer = Vec::with_capacity(batch);
            b.iter(|| {
                let mut enumerator = view.enumerate().unwrap();
                let mut n = 0;
                while enumerator.next_batch(&mut buffer).unwrap() > 0 {
                    n += buffer.len();
                }
                black_box(n)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, view_at_benchmark, view_enumerate_benchmark);
criterion_main!(benches);
