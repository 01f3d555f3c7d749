//! Enqueue/drain cycle benchmarks: dispatcher drain vs visitor drain, default vs
//! high-contention policy, single-threaded and multi-producer.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use events_bus::{DefaultPolicy, EventQueue, HighContentionPolicy, Policy};
use rand::prelude::*;

const BATCH: usize = 1024;
const KEYS: u32 = 8;

fn enqueue_drain_cycle<P: Policy>(queue: &EventQueue<u32, u64, P>, keys: &[u32]) {
    for (i, key) in keys.iter().enumerate() {
        queue.enqueue(*key, i as u64);
    }
    queue.process();
}

fn single_thread_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_thread_cycle");
    group.throughput(Throughput::Elements(BATCH as u64));

    let mut rng = rand::rng();
    let keys: Vec<u32> = (0..BATCH).map(|_| rng.random_range(0..KEYS)).collect();

    {
        let queue = EventQueue::<u32, u64, DefaultPolicy>::new();
        let sink = Arc::new(AtomicUsize::new(0));
        for key in 0..KEYS {
            let sink = Arc::clone(&sink);
            queue.append_listener(key, move |value: &u64| {
                sink.fetch_add(*value as usize, Ordering::Relaxed);
            });
        }

        group.bench_with_input(
            BenchmarkId::new("dispatcher_drain", "default"),
            &keys,
            |b, keys| b.iter(|| enqueue_drain_cycle(&queue, keys)),
        );
    }

    {
        let queue = EventQueue::<u32, u64, HighContentionPolicy>::new();
        let sink = Arc::new(AtomicUsize::new(0));
        for key in 0..KEYS {
            let sink = Arc::clone(&sink);
            queue.append_listener(key, move |value: &u64| {
                sink.fetch_add(*value as usize, Ordering::Relaxed);
            });
        }

        group.bench_with_input(
            BenchmarkId::new("dispatcher_drain", "high_contention"),
            &keys,
            |b, keys| b.iter(|| enqueue_drain_cycle(&queue, keys)),
        );
    }

    {
        let queue = EventQueue::<u32, u64, HighContentionPolicy>::new();
        let mut sink = 0_u64;

        group.bench_with_input(
            BenchmarkId::new("visitor_drain", "high_contention"),
            &keys,
            |b, keys| {
                b.iter(|| {
                    for (i, key) in keys.iter().enumerate() {
                        queue.enqueue(*key, i as u64);
                    }
                    queue.process_with(|_key, value| sink = sink.wrapping_add(*value));
                });
            },
        );
    }

    group.finish();
}

fn multi_producer_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_producer_drain");

    for producers in [2_u32, 4] {
        let per_producer = BATCH / producers as usize;
        group.throughput(Throughput::Elements((per_producer * producers as usize) as u64));

        group.bench_with_input(
            BenchmarkId::new("high_contention", producers),
            &producers,
            |b, &producers| {
                let queue = EventQueue::<u32, u64, HighContentionPolicy>::new();
                let sink = Arc::new(AtomicUsize::new(0));
                for key in 0..producers {
                    let sink = Arc::clone(&sink);
                    queue.append_listener(key, move |_value: &u64| {
                        sink.fetch_add(1, Ordering::Relaxed);
                    });
                }

                b.iter(|| {
                    thread::scope(|s| {
                        for key in 0..producers {
                            let queue = &queue;
                            s.spawn(move || {
                                for i in 0..per_producer {
                                    queue.enqueue(key, i as u64);
                                }
                            });
                        }
                    });
                    while queue.process() {}
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, single_thread_cycle, multi_producer_drain);
criterion_main!(benches);
