//! Benchmarks for track/trigger fan-out and computed chains.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reactivity_core::reactive::{computed, effect, reactive, ref_, stop, ComputedRef, Runner};
use reactivity_core::Value;

/// One write re-running `n` subscribed effects.
fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for n in [1, 10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("property_write", n), &n, |b, &n| {
            let state = reactive(Value::object_from([("count", Value::from(0))]));
            let runners: Vec<Runner> = (0..n)
                .map(|_| {
                    let state = state.clone();
                    effect(move || {
                        black_box(state.get("count"));
                    })
                })
                .collect();

            let mut next = 0;
            b.iter(|| {
                next += 1;
                state.set("count", next);
            });

            for runner in &runners {
                stop(runner);
            }
        });
    }

    group.finish();
}

/// Reading through a chain of `n` computeds after the source changed.
fn bench_computed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed_chain");

    for n in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::new("invalidate_and_read", n), &n, |b, &n| {
            let source = ref_(0);
            let mut chain: Vec<ComputedRef> = Vec::with_capacity(n);
            let first = source.clone();
            chain.push(computed(move || first.value()));
            for _ in 1..n {
                let previous = chain[chain.len() - 1].clone();
                chain.push(computed(move || {
                    previous.value().as_f64().unwrap_or(0.0) + 1.0
                }));
            }
            let last = chain[chain.len() - 1].clone();

            let mut next = 0;
            b.iter(|| {
                next += 1;
                source.set_value(next).unwrap();
                black_box(last.value());
            });
        });
    }

    group.finish();
}

/// Wrapping and reading nested data through fresh proxies.
fn bench_deep_read(c: &mut Criterion) {
    let data = Value::from(serde_json::json!({
        "user": {"profile": {"name": "ada", "tags": ["a", "b", "c"]}}
    }));

    c.bench_function("deep_read", |b| {
        b.iter(|| {
            let state = reactive(data.clone());
            black_box(state.get("user").get("profile").get("tags").get(2));
        });
    });
}

criterion_group!(benches, bench_fan_out, bench_computed_chain, bench_deep_read);
criterion_main!(benches);
