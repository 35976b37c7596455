//! Tokio runtime benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sdlfsm_core::{Callback, ProcessDefinition, ProcessId, Scheduler, Signal, Value};
use sdlfsm_runtime::{FsmManager, RuntimeConfig, SchedulerConfig, TokioScheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;

struct NullCallback;

impl Callback for NullCallback {
    fn handle_send_signal(&self, _process_id: ProcessId, _name: &str, _args: &[Value]) {}

    fn handle_function_call(&self, _process_id: ProcessId, _name: &str, _args: &mut [Value]) {}
}

fn short_lived_definition() -> ProcessDefinition {
    let definition = serde_json::json!({
        "variables": [{"name": "hops", "type": "INT", "value": 0}],
        "states": ["WAITING"],
        "start": [{"action": "next_state", "state": "WAITING"}],
        "handlers": [
            {"state": "WAITING", "signal": "hop", "actions": [
                {"action": "task", "var": "hops",
                 "value": {"op": "+", "lhs": {"var": "hops"}, "rhs": 1}},
                {"action": "condition", "op": "<", "lhs": {"var": "hops"}, "rhs": {"var": "$1"},
                 "then": [{"action": "next_state", "state": "WAITING"}],
                 "else": [{"action": "exit"}]}
            ]}
        ]
    });
    ProcessDefinition::from_json("short_lived", &definition).unwrap()
}

fn setup_manager(rt: &Runtime) -> Arc<FsmManager> {
    let _guard = rt.enter();
    let manager = Arc::new(FsmManager::new(&RuntimeConfig::default(), Arc::new(NullCallback)).unwrap());
    let runner = Arc::clone(&manager);
    rt.spawn(async move { runner.run().await });
    manager
}

fn bench_process_lifecycle(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = setup_manager(&rt);
    let definition = short_lived_definition();

    let mut group = c.benchmark_group("runtime_process_lifecycle");

    for hops in [1i64, 10, 100] {
        group.throughput(Throughput::Elements(hops as u64));
        group.bench_with_input(BenchmarkId::new("signals", hops), &hops, |b, &hops| {
            b.to_async(&rt).iter(|| {
                let manager = Arc::clone(&manager);
                let definition = definition.clone();
                async move {
                    let pid = manager.create_process(&definition).unwrap();
                    manager.start_process(pid).unwrap();
                    for _ in 0..hops {
                        manager
                            .send_signal(Signal::with_args(pid, "hop", vec![Value::int(hops)]))
                            .unwrap();
                    }
                    black_box(manager.wait_finished(pid, Duration::from_secs(5)).await.unwrap())
                }
            });
        });
    }

    group.finish();
    manager.shutdown();
}

fn bench_scheduler(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let scheduler = TokioScheduler::new(rt.handle().clone(), &SchedulerConfig::default());

    let mut group = c.benchmark_group("runtime_scheduler");
    group.throughput(Throughput::Elements(1));

    group.bench_function("schedule_cancel", |b| {
        b.iter(|| {
            let job = scheduler
                .schedule(Duration::from_secs(60), Box::new(|_| {}))
                .unwrap();
            scheduler.cancel(black_box(job)).unwrap();
        })
    });

    group.bench_function("schedule_fire", |b| {
        b.to_async(&rt).iter(|| {
            let (tx, rx) = oneshot::channel();
            scheduler
                .schedule(
                    Duration::ZERO,
                    Box::new(move |job| {
                        let _ = tx.send(job);
                    }),
                )
                .unwrap();
            async move { black_box(rx.await.unwrap()) }
        })
    });

    group.finish();
    scheduler.shutdown();
}

criterion_group!(benches, bench_process_lifecycle, bench_scheduler);
criterion_main!(benches);
