//! Performance benchmarks for the mutation tracker.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reactive_state::{deep_equal, Facade, Tracker, TrackerConfig, Value};
use serde_json::json;

fn create_state(tracker: &Tracker, width: usize) -> Facade {
    let rows: Vec<Value> = (0..width)
        .map(|i| Value::from(json!({"id": i, "label": format!("row {}", i), "tags": ["a", "b"]})))
        .collect();
    tracker
        .track(Value::map([("rows", Value::from(rows)), ("count", Value::from(0))]))
        .unwrap()
}

/// Benchmark structural comparison of equal trees of growing width
fn bench_deep_equal(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_equal");

    for width in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("rows", width), &width, |b, &width| {
            let tracker = Tracker::new(TrackerConfig::default());
            let left = create_state(&tracker, width).snapshot();
            let right = left.deep_clone();

            b.iter(|| black_box(deep_equal(&left, &right)));
        });
    }

    group.finish();
}

/// Benchmark writes that are suppressed by change detection
fn bench_noop_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("noop_write");

    for width in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("rows", width), &width, |b, &width| {
            let tracker = Tracker::new(TrackerConfig::default());
            let state = create_state(&tracker, width);
            let _ = state.subscribe("rows", |_| {});
            let replacement = state.snapshot();
            let rows = replacement.as_object().unwrap().get("rows").unwrap();

            b.iter(|| {
                state.set("rows", rows.deep_clone());
                tracker.run_until_idle();
            });
        });
    }

    group.finish();
}

/// Benchmark a write plus flush with varying listener counts
fn bench_write_and_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_and_flush");

    for listeners in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("listeners", listeners),
            &listeners,
            |b, &listeners| {
                let tracker = Tracker::new(TrackerConfig::default());
                let state = create_state(&tracker, 1);
                for _ in 0..listeners {
                    let _ = state.subscribe("count", |v| {
                        black_box(v);
                    });
                }

                let mut n = 0u64;
                b.iter(|| {
                    n += 1;
                    state.set("count", n);
                    tracker.run_until_idle();
                });
            },
        );
    }

    group.finish();
}

/// Benchmark nested reads through façades
fn bench_nested_read(c: &mut Criterion) {
    let tracker = Tracker::new(TrackerConfig::default());
    let state = create_state(&tracker, 100);

    c.bench_function("nested_read", |b| {
        b.iter(|| {
            let rows = state.get("rows").unwrap().into_facade().unwrap();
            let row = rows.get(50).unwrap().into_facade().unwrap();
            black_box(row.get("label"));
        });
    });
}

criterion_group!(
    benches,
    bench_deep_equal,
    bench_noop_write,
    bench_write_and_flush,
    bench_nested_read
);
criterion_main!(benches);
