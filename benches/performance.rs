use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use inventory_api::idempotency::{
    canonicalize_body, request_hash, IdempotencyRecord, IdempotencyStore, MemoryIdempotencyStore,
};
use inventory_api::observability::LatencyTimer;

fn product_body(fields: usize) -> String {
    let entries: Vec<String> = (0..fields)
        .rev()
        .map(|i| format!("\"field_{:04}\": {{ \"value\": {}, \"tags\": [\"a\", \"b\"] }}", i, i))
        .collect();
    format!("{{ \"productName\": \"Widget\", {} }}", entries.join(",\n  "))
}

fn benchmark_canonicalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical");
    group.measurement_time(Duration::from_secs(10));

    for fields in [1, 10, 100, 1000].iter() {
        let body = product_body(*fields);
        group.bench_with_input(BenchmarkId::new("canonicalize_json", fields), &body, |b, body| {
            b.iter(|| black_box(canonicalize_body(black_box(body.as_bytes()))));
        });
        group.bench_with_input(BenchmarkId::new("request_hash", fields), &body, |b, body| {
            b.iter(|| {
                black_box(request_hash(
                    black_box("POST"),
                    black_box("/api/v1/products"),
                    black_box(body.as_bytes()),
                ))
            });
        });
    }

    group.bench_function("canonicalize_non_json", |b| {
        let body = "   plain text payload that is not json   ".repeat(32);
        b.iter(|| black_box(canonicalize_body(black_box(body.as_bytes()))));
    });

    group.finish();
}

fn benchmark_memory_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_store");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let store = MemoryIdempotencyStore::new();
    runtime.block_on(async {
        for i in 0..10_000 {
            store
                .set(
                    &format!("/api/v1/products:key-{}", i),
                    IdempotencyRecord::new("hash", i),
                    Duration::from_secs(3600),
                )
                .await
                .unwrap();
        }
    });

    group.bench_function("get_hit", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(store.get("/api/v1/products:key-5000").await.unwrap()) });
    });

    group.bench_function("get_miss", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(store.get("/api/v1/products:absent").await.unwrap()) });
    });

    group.bench_function("set", |b| {
        b.to_async(&runtime).iter(|| async {
            store
                .set(
                    "/api/v1/products:bench",
                    IdempotencyRecord::new("hash", 1),
                    Duration::from_secs(60),
                )
                .await
                .unwrap()
        });
    });

    group.finish();
}

fn benchmark_latency_timer(c: &mut Criterion) {
    c.bench_function("latency_timer", |b| {
        b.iter(|| {
            let timer = LatencyTimer::new();
            black_box(timer.elapsed_ms())
        });
    });
}

criterion_group!(
    benches,
    benchmark_canonicalization,
    benchmark_memory_store,
    benchmark_latency_timer,
);

criterion_main!(benches);
