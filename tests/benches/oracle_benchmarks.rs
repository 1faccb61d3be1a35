//! # Price Oracle Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | Worker | Admit one submission | < 50µs |
//! | Service | Execute one block | < 5ms |
//! | Recovery | Replay the retention window | < 50ms |
//! | Context | State digest | < 1ms |

#![allow(clippy::excessive_nesting)]

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use qc_18_price_oracle::{OracleApi, OracleConfig, Power, Worker};
use qc_tests::fixtures::{
    random_plan, single_feeder_params, submission, two_feeder_params, validators_with_powers,
    Node,
};
use std::time::Duration;

// ============================================================================
// Worker: Filter -> Calculator -> Aggregator
// ============================================================================

fn bench_worker_admit(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-worker");
    group.measurement_time(Duration::from_secs(5));
    let params = single_feeder_params();

    for validators in [4u8, 16, 64, 128] {
        let powers = validators_with_powers(&vec![1; validators as usize]);
        let msgs: Vec<_> = (1..=validators)
            .map(|v| submission(v, 1, 1, 1, Some(("9", 10 + u64::from(v % 3))), Some(20)))
            .collect();

        group.throughput(Throughput::Elements(u64::from(validators)));
        group.bench_with_input(
            BenchmarkId::new("admit_round", validators),
            &msgs,
            |b, msgs| {
                b.iter_batched(
                    || Worker::new(1, 1, 1, &params, &powers),
                    |mut worker| {
                        for msg in msgs {
                            let _ = black_box(worker.admit(msg, Power::one(), &params));
                        }
                        worker
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

// ============================================================================
// Service: full block lifecycle
// ============================================================================

fn bench_block_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-service");
    group.measurement_time(Duration::from_secs(10));

    for blocks in [20u64, 100] {
        let plan = random_plan(42, blocks);
        group.throughput(Throughput::Elements(blocks));
        group.bench_with_input(BenchmarkId::new("run_blocks", blocks), &plan, |b, plan| {
            b.iter_batched(
                || {
                    Node::fresh(
                        OracleConfig::default(),
                        two_feeder_params(),
                        validators_with_powers(&[1, 2, 3, 4]),
                    )
                },
                |node| {
                    for block in plan {
                        black_box(node.run_block(block));
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

// ============================================================================
// Recovery and digest
// ============================================================================

fn bench_recovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-18-recovery");
    let config = OracleConfig::default();
    let plan = random_plan(42, 100);
    let node = Node::fresh(
        config.clone(),
        two_feeder_params(),
        validators_with_powers(&[1, 2, 3, 4]),
    );
    for block in &plan {
        node.run_block(block);
    }

    group.bench_function("recover_at_100", |b| {
        b.iter_batched(
            || {
                Node::on_store(
                    config.clone(),
                    node.crash_snapshot(),
                    two_feeder_params(),
                    validators_with_powers(&[1, 2, 3, 4]),
                )
            },
            |restarted| black_box(restarted.service.recover(100).is_ok()),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("state_digest", |b| {
        b.iter(|| black_box(node.service.state_digest()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_worker_admit,
    bench_block_execution,
    bench_recovery
);
criterion_main!(benches);
