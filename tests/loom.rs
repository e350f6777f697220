//! Tests using the `loom` testing framework.

#![cfg(loom)]

use loom::model::Builder;
use loom::sync::atomic::AtomicUsize;
use loom::sync::atomic::Ordering;
use tracing::{Level, info};
use tracing_subscriber::fmt::Subscriber;

use tessel::prelude::*;

fn model<F>(f: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let subscriber = Subscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .without_time()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut model = Builder::new();
        model.log = true;
        model.check(f);
    });
}

/// Creates a pool with the given number of threads, runs `f` against it, and
/// tears it down again. Waits never spin, so every wait goes through the
/// parking path.
fn with_thread_pool<F>(threads: usize, f: F)
where
    F: Fn(&ThreadPool),
{
    info!("### SETTING UP TEST");
    let thread_pool = ThreadPool::builder()
        .num_threads(threads)
        .spin_iterations(0)
        .build()
        .unwrap();

    info!("### STARTING TEST");
    f(&thread_pool);

    info!("### SHUTTING DOWN POOL");
    drop(thread_pool);

    info!("### TEST COMPLETE");
}

// Spins up a pool with one worker, then shuts it down without dispatching.
#[test]
pub fn create_and_destroy() {
    model(|| {
        with_thread_pool(2, |_| {});
    });
}

// A pool of one thread spawns nothing and runs on the caller.
#[test]
pub fn single_thread_dispatch() {
    model(|| {
        with_thread_pool(1, |pool| {
            let count = AtomicUsize::new(0);
            pool.parallelize_1d(2, Flags::empty(), |_| {
                count.fetch_add(1, Ordering::Relaxed);
            });
            assert_eq!(count.load(Ordering::Relaxed), 2);
        });
    });
}

// The caller and one worker each run one unit; both must be visible once the
// dispatch returns.
#[test]
pub fn dispatch() {
    model(|| {
        with_thread_pool(2, |pool| {
            let count = AtomicUsize::new(0);
            pool.parallelize_1d(2, Flags::empty(), |_| {
                count.fetch_add(1, Ordering::Relaxed);
            });
            assert_eq!(count.load(Ordering::Relaxed), 2);
        });
    });
}

// Two dispatches in a row, the first switching the worker to blocking waits.
#[test]
pub fn dispatch_twice_with_yield() {
    model(|| {
        with_thread_pool(2, |pool| {
            let count = AtomicUsize::new(0);
            pool.parallelize_1d(2, Flags::YIELD_WORKERS, |_| {
                count.fetch_add(1, Ordering::Relaxed);
            });
            pool.parallelize_1d(2, Flags::empty(), |_| {
                count.fetch_add(1, Ordering::Relaxed);
            });
            assert_eq!(count.load(Ordering::Relaxed), 4);
        });
    });
}
