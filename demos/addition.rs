//! Adds two arrays element-wise on a thread pool.
//!
//! Run with `RUST_LOG=tessel=trace` and a debug build to see the dispatch
//! protocol in action.

use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering;

use tessel::prelude::*;
use tracing::info;

const ARRAY_SIZE: usize = 20;

fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let augend: Vec<f64> = (0..ARRAY_SIZE).map(|i| i as f64).collect();
    let addend: Vec<f64> = (0..ARRAY_SIZE).map(|i| i as f64).collect();

    // Each element is written by exactly one task, so relaxed stores suffice.
    let sum: Vec<AtomicU64> = (0..ARRAY_SIZE).map(|_| AtomicU64::new(0)).collect();

    let pool = ThreadPool::new(0).expect("failed to create thread pool");
    info!("created thread pool with {} threads", pool.threads_count());

    pool.parallelize_1d_with_thread(ARRAY_SIZE, Flags::DISABLE_DENORMALS, |thread, i| {
        let value = augend[i] + addend[i];
        sum[i].store(value.to_bits(), Ordering::Relaxed);
        info!("thread {thread} added element {i}");
    });

    pool.destroy();

    let sum: Vec<f64> = sum
        .into_iter()
        .map(|bits| f64::from_bits(bits.into_inner()))
        .collect();

    println!("augend: {augend:?}");
    println!("addend: {addend:?}");
    println!("sum:    {sum:?}");
}
