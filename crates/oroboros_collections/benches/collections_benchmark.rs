//! # Pooled Collections Benchmark
//!
//! Warm-pool throughput of the hot container operations, with std
//! collections alongside for reference.
//!
//! Run with: `cargo bench --package oroboros_collections`

// Benchmarks don't need docs
#![allow(missing_docs)]

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use oroboros_collections::{PooledList, PooledMap, PooledQueue, PooledStack};

/// Benchmark: Insert then look up N integer keys.
fn bench_map_insert_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_insert_lookup");

    for count in [1_000u32, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::new("pooled", count), &count, |b, &count| {
            b.iter(|| {
                let mut map: PooledMap<u32, u32> = PooledMap::new();
                for key in 0..count {
                    let _ = map.insert(key, key);
                }
                let mut sum = 0u64;
                for key in 0..count {
                    if let Ok(Some(value)) = map.get(&key) {
                        sum += u64::from(*value);
                    }
                }
                black_box(sum)
            });
        });

        group.bench_with_input(BenchmarkId::new("std", count), &count, |b, &count| {
            b.iter(|| {
                let mut map = HashMap::new();
                for key in 0..count {
                    map.insert(key, key);
                }
                let sum: u64 = (0..count)
                    .filter_map(|key| map.get(&key))
                    .map(|value| u64::from(*value))
                    .sum();
                black_box(sum)
            });
        });
    }

    group.finish();
}

/// Benchmark: Remove half the keys, then refill through the free list.
fn bench_map_churn(c: &mut Criterion) {
    c.bench_function("map_churn_10k", |b| {
        let mut map: PooledMap<u32, u32> = PooledMap::with_capacity(10_000);
        for key in 0..10_000 {
            let _ = map.insert(key, key);
        }
        b.iter(|| {
            for key in (0..10_000).step_by(2) {
                let _ = map.remove(&key);
            }
            for key in (0..10_000).step_by(2) {
                let _ = map.insert(key, key);
            }
            black_box(map.len())
        });
    });
}

/// Benchmark: Fill a list from an empty start (buffer comes from the pool).
fn bench_list_fill(c: &mut Criterion) {
    c.bench_function("list_fill_100k", |b| {
        b.iter(|| {
            let mut list: PooledList<u64> = PooledList::new();
            for i in 0..100_000u64 {
                list.add(i);
            }
            black_box(list.len())
        });
    });
}

/// Benchmark: Steady-state queue traffic across the wrap point.
fn bench_queue_cycle(c: &mut Criterion) {
    c.bench_function("queue_cycle_64k", |b| {
        let mut queue: PooledQueue<u64> = PooledQueue::with_capacity(1024);
        b.iter(|| {
            for i in 0..65_536u64 {
                queue.enqueue(i);
                if queue.len() > 512 {
                    black_box(queue.try_dequeue());
                }
            }
            queue.clear();
        });
    });
}

/// Benchmark: Push then pop N items.
fn bench_stack_push_pop(c: &mut Criterion) {
    c.bench_function("stack_push_pop_100k", |b| {
        b.iter(|| {
            let mut stack: PooledStack<u64> = PooledStack::new();
            for i in 0..100_000u64 {
                stack.push(i);
            }
            let mut sum = 0u64;
            while let Some(item) = stack.try_pop() {
                sum = sum.wrapping_add(item);
            }
            black_box(sum)
        });
    });
}

criterion_group!(
    benches,
    bench_map_insert_lookup,
    bench_map_churn,
    bench_list_fill,
    bench_queue_cycle,
    bench_stack_push_pop,
);
criterion_main!(benches);
