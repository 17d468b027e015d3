//! # Pool Performance Benchmark
//!
//! REQUIREMENTS:
//! - Allocate/free churn stays O(1) per operation
//! - A full tick over 4096 live objects stays well under a frame
//!
//! Run with: `cargo bench --package cinder_core`

// Benchmarks don't need docs
#![allow(missing_docs)]
#![allow(dead_code)]

use cinder_core::{Lifecycle, Pool, SlotRef};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const POOL_SIZE: usize = 4096;

#[derive(Default)]
struct Mote {
    energy: u32,
}

impl Lifecycle for Mote {
    fn process(&mut self) {
        self.energy = self.energy.wrapping_add(1);
    }
}

fn filled_pool() -> Pool<Mote, POOL_SIZE> {
    let mut pool = Pool::new();
    for _ in 0..POOL_SIZE {
        if let Ok(handle) = pool.allocate() {
            let _ = pool.activate(handle);
        }
    }
    pool
}

/// Benchmark: allocate every slot, then free them in random order.
fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_free_churn");

    for count in [256, 1024, POOL_SIZE] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut pool: Pool<Mote, POOL_SIZE> = Pool::new();
            let mut rng = ChaCha8Rng::seed_from_u64(7);
            let mut handles: Vec<SlotRef> = Vec::with_capacity(count);

            b.iter(|| {
                handles.clear();
                for _ in 0..count {
                    if let Ok(handle) = pool.allocate() {
                        handles.push(handle);
                    }
                }
                handles.shuffle(&mut rng);
                for &handle in &handles {
                    let _ = black_box(pool.free(handle));
                }
            });
        });
    }

    group.finish();
}

/// Benchmark: one tick over a full pool.
fn bench_tick(c: &mut Criterion) {
    let mut pool = filled_pool();

    c.bench_function("run_tick_4096", |b| {
        b.iter(|| black_box(pool.run_tick(|_, _| {})));
    });
}

/// Benchmark: one tick where every object frees itself (deferred).
fn bench_tick_with_deferred_frees(c: &mut Criterion) {
    c.bench_function("run_tick_4096_free_all", |b| {
        b.iter_batched(
            filled_pool,
            |mut pool| {
                pool.run_tick(|guard, handle| {
                    let _ = guard.free(handle);
                })
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_churn, bench_tick, bench_tick_with_deferred_frees);
criterion_main!(benches);
