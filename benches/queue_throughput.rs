//! Benchmarks for hand-off queues and stage workers
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scope_link::pipeline::{
    ramp_buffer, ChannelQueue, HandoffQueue, OverflowPolicy, ProcessorSettings, ProcessorStage,
    StageWorker, TriggerSettings, TriggerStage, RAMP_MIDPOINT,
};
use std::sync::Arc;

fn bench_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_pop");
    group.throughput(Throughput::Elements(1));

    let unbounded: ChannelQueue<u64> = ChannelQueue::unbounded("bench");
    group.bench_function("unbounded", |b| {
        let mut i = 0u64;
        b.iter(|| {
            unbounded.push(black_box(i));
            black_box(unbounded.pop());
            i = i.wrapping_add(1);
        });
    });

    // Always full, so every push exercises the overflow path.
    for policy in [OverflowPolicy::DropNewest, OverflowPolicy::DropOldest] {
        let queue: ChannelQueue<u64> = ChannelQueue::bounded("bench", 64, policy);
        for i in 0..64 {
            queue.push(i);
        }
        group.bench_with_input(
            BenchmarkId::new("bounded_full", format!("{:?}", policy)),
            &queue,
            |b, queue| {
                let mut i = 0u64;
                b.iter(|| {
                    queue.push(black_box(i));
                    i = i.wrapping_add(1);
                });
            },
        );
    }

    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain");

    for size in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("drain", size), size, |b, &size| {
            let queue: ChannelQueue<Vec<u8>> = ChannelQueue::unbounded("bench");
            b.iter(|| {
                for _ in 0..size {
                    queue.push(vec![0u8; 16]);
                }
                black_box(queue.drain());
            });
        });
    }

    group.finish();
}

fn bench_concurrent_producers(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_producers");
    const PER_PRODUCER: usize = 10_000;

    for producers in [1usize, 2, 4].iter() {
        group.throughput(Throughput::Elements((producers * PER_PRODUCER) as u64));
        group.bench_with_input(
            BenchmarkId::new("mpsc", producers),
            producers,
            |b, &producers| {
                b.iter(|| {
                    let queue: Arc<ChannelQueue<usize>> = Arc::new(ChannelQueue::unbounded("bench"));
                    let handles: Vec<_> = (0..producers)
                        .map(|_| {
                            let queue = Arc::clone(&queue);
                            std::thread::spawn(move || {
                                for i in 0..PER_PRODUCER {
                                    queue.push(i);
                                }
                            })
                        })
                        .collect();

                    let mut received = 0;
                    while received < producers * PER_PRODUCER {
                        if queue.pop().is_some() {
                            received += 1;
                        }
                    }
                    for h in handles {
                        let _ = h.join();
                    }
                    black_box(received)
                });
            },
        );
    }

    group.finish();
}

fn bench_stage_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("stage_workers");

    let trigger_settings = TriggerSettings {
        channel_count: 4,
        level: RAMP_MIDPOINT,
        ..TriggerSettings::default()
    };
    group.throughput(Throughput::Bytes(4 * 1024));
    group.bench_function("trigger_4x1024", |b| {
        let mut trigger = TriggerStage::new();
        b.iter(|| {
            let mut out = None;
            let _ = trigger.process(ramp_buffer(4, 1024, 3), &trigger_settings, &mut |buf| {
                out = Some(buf)
            });
            black_box(out)
        });
    });

    let processor_settings = ProcessorSettings {
        channel_count: 4,
        persistence_depth: 8,
    };
    group.bench_function("processor_4x1024_depth8", |b| {
        let mut processor = ProcessorStage::new();
        b.iter(|| {
            let mut out = None;
            let _ = processor.process(ramp_buffer(4, 1024, 0), &processor_settings, &mut |frame| {
                out = Some(frame)
            });
            black_box(out)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_push_pop,
    bench_drain,
    bench_concurrent_producers,
    bench_stage_workers
);
criterion_main!(benches);
