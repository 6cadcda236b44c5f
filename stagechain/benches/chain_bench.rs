//! Benchmarks for chain execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};
use stagechain::pipeline::Stage;
use stagechain::runner::Runner;

fn increment() -> Runner {
    Runner::sync(|v| Ok(json!(v.as_i64().unwrap_or_default() + 1)))
}

fn chain_benchmark(c: &mut Criterion) {
    let mut chain = Stage::new();
    for _ in 0..16 {
        chain = chain.then(increment());
    }

    c.bench_function("sync_chain_16", |b| {
        b.iter(|| futures::executor::block_on(chain.start(black_box(json!(0)))))
    });

    let group = Stage::new().all((0..16).map(|_| increment()));

    c.bench_function("sync_group_16", |b| {
        b.iter(|| futures::executor::block_on(group.start(black_box(Value::Null))))
    });

    c.bench_function("build_chain_16", |b| {
        b.iter(|| {
            let mut stage = Stage::new();
            for _ in 0..16 {
                stage = stage.then(increment());
            }
            black_box(stage)
        })
    });
}

criterion_group!(benches, chain_benchmark);
criterion_main!(benches);
