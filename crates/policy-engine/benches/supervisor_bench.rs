//! Start/stop throughput of the execution supervisor

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use policy_engine::lookout_core::{
    CancelSignal, ChannelSink, EventStream, HandlerRegistry, Policy, Result,
};
use policy_engine::ExecutionSupervisor;
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

fn idle_handler(_: &Policy, cancel: CancelSignal) -> Result<EventStream> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        cancel.cancelled().await;
        drop(tx);
    });
    Ok(rx)
}

fn benchmark_start_stop(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let _guard = runtime.enter();

    let registry = HandlerRegistry::new();
    registry.register("idle", idle_handler).unwrap();
    let (sink, _events) = ChannelSink::new();
    let supervisor = ExecutionSupervisor::new(Arc::new(registry), Arc::new(sink));

    let mut group = c.benchmark_group("supervisor");
    for running in [0usize, 100, 1000] {
        for i in 0..running {
            supervisor
                .start(&Policy::new(format!("background-{i}"), "agent", "idle"))
                .unwrap();
        }
        let policy = Policy::new("bench", "agent", "idle");

        group.bench_with_input(BenchmarkId::new("start_stop", running), &running, |b, _| {
            b.iter(|| {
                supervisor.start(black_box(&policy)).unwrap();
                supervisor.stop(black_box("bench")).unwrap();
            });
        });
        supervisor.stop_all();
    }
    group.finish();
}

criterion_group!(benches, benchmark_start_stop);
criterion_main!(benches);
