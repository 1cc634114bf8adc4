use bottling_plant::prelude::*;
use bottling_plant::queue::WorkQueue;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

fn bench_config(workers: usize, oranges: u64) -> PlantConfig {
    PlantConfig::new(workers)
        .with_stage_costs(StageCosts::zero())
        .with_production_interval(Duration::ZERO)
        .with_poll_timeout(Duration::from_millis(10))
        .with_drain_check_interval(Duration::from_millis(1))
        .with_supply_limit(oranges)
}

fn benchmark_orange_advance(c: &mut Criterion) {
    let costs = StageCosts::zero();
    let token = CancellationToken::new();

    c.bench_function("orange_fetch_to_processed", |b| {
        b.iter(|| {
            let mut orange = Orange::fetch(1, &costs, &token);
            while !orange.is_processed() {
                black_box(orange.advance(&costs, &token).expect("advance failed"));
            }
            orange
        });
    });
}

fn benchmark_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("work_queue");

    group.bench_function("send_recv_1000", |b| {
        let queue = WorkQueue::unbounded();
        b.iter(|| {
            for i in 0..1000u64 {
                queue.send(i).expect("queue closed");
            }
            for _ in 0..1000 {
                black_box(queue.recv_timeout(Duration::from_millis(1)).ok());
            }
        });
    });

    group.finish();
}

fn benchmark_plant_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("plant_throughput");
    group.sample_size(20);

    for workers in [1usize, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("oranges_500", workers),
            &workers,
            |b, &workers| {
                b.iter(|| {
                    let plant =
                        Plant::with_observer(1, bench_config(workers, 500), Arc::new(NoopObserver))
                            .expect("Failed to create plant");
                    plant.start().expect("Failed to start plant");
                    plant.wait_to_stop().expect("Producer failed");
                    black_box(plant.stop().expect("Failed to stop plant"))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_orange_advance,
    benchmark_queue,
    benchmark_plant_throughput
);
criterion_main!(benches);
