//! Benchmarks for dispatch overhead and for a simple two-dimensional kernel.

use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering;

use divan::Bencher;
use divan::black_box;
use rayon::prelude::*;
use tessel::prelude::*;

// -----------------------------------------------------------------------------
// Workload

/// Side lengths of the square grids being summed.
const SIDES: &[usize] = &[8, 64, 512];

/// A small amount of arithmetic per grid element, so the per-unit cost is not
/// entirely dominated by the atomic.
#[inline]
fn kernel(i: usize, j: usize) -> u64 {
    let x = (i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ j as u64;
    x.rotate_left(17).wrapping_add(x >> 7)
}

fn expected(side: usize) -> u64 {
    let mut sum = 0_u64;
    for i in 0..side {
        for j in 0..side {
            sum = sum.wrapping_add(kernel(i, j));
        }
    }
    sum
}

// -----------------------------------------------------------------------------
// Dispatch overhead

#[divan::bench]
fn empty_dispatch_tessel(bencher: Bencher) {
    let pool = ThreadPool::new(0).unwrap();
    bencher.bench_local(|| {
        pool.parallelize_1d(pool.threads_count(), Flags::empty(), |i| {
            black_box(i);
        });
    });
}

#[divan::bench]
fn empty_dispatch_rayon(bencher: Bencher) {
    let threads = rayon::current_num_threads();
    bencher.bench_local(|| {
        (0..threads).into_par_iter().for_each(|i| {
            black_box(i);
        });
    });
}

// -----------------------------------------------------------------------------
// Two-dimensional kernel

#[divan::bench(args = SIDES)]
fn baseline(bencher: Bencher, side: usize) {
    let target = expected(side);
    bencher.bench_local(move || {
        let sum = AtomicU64::new(0);
        Serial.parallelize_2d_tile_1d(side, side, 8, Flags::empty(), |i, j, size_j| {
            let partial = (j..j + size_j).fold(0_u64, |acc, j| acc.wrapping_add(kernel(i, j)));
            sum.fetch_add(partial, Ordering::Relaxed);
        });
        assert_eq!(sum.into_inner(), target);
    });
}

#[divan::bench(args = SIDES)]
fn tessel(bencher: Bencher, side: usize) {
    let pool = ThreadPool::new(0).unwrap();
    let target = expected(side);
    bencher.bench_local(move || {
        let sum = AtomicU64::new(0);
        pool.parallelize_2d_tile_1d(side, side, 8, Flags::empty(), |i, j, size_j| {
            let partial = (j..j + size_j).fold(0_u64, |acc, j| acc.wrapping_add(kernel(i, j)));
            sum.fetch_add(partial, Ordering::Relaxed);
        });
        assert_eq!(sum.into_inner(), target);
    });
}

#[divan::bench(args = SIDES)]
fn tessel_yield(bencher: Bencher, side: usize) {
    let pool = ThreadPool::new(0).unwrap();
    let target = expected(side);
    bencher.bench_local(move || {
        let sum = AtomicU64::new(0);
        pool.parallelize_2d_tile_1d(side, side, 8, Flags::YIELD_WORKERS, |i, j, size_j| {
            let partial = (j..j + size_j).fold(0_u64, |acc, j| acc.wrapping_add(kernel(i, j)));
            sum.fetch_add(partial, Ordering::Relaxed);
        });
        assert_eq!(sum.into_inner(), target);
    });
}

#[divan::bench(args = SIDES)]
fn rayon(bencher: Bencher, side: usize) {
    let target = expected(side);
    bencher.bench_local(move || {
        let sum = AtomicU64::new(0);
        (0..side).into_par_iter().for_each(|i| {
            (0..side).into_par_iter().step_by(8).for_each(|j| {
                let end = (j + 8).min(side);
                let partial = (j..end).fold(0_u64, |acc, j| acc.wrapping_add(kernel(i, j)));
                sum.fetch_add(partial, Ordering::Relaxed);
            });
        });
        assert_eq!(sum.into_inner(), target);
    });
}

fn main() {
    divan::main();
}
