//! A thread-pool for embarrassingly parallel loops over dense index grids.
//!
//! Tessel executes "for-each" workloads over 1 to 6 dimensional grids with
//! minimal per-call overhead. It is designed for numeric kernels that issue
//! thousands of short parallel regions per second and cannot afford to spawn
//! threads or allocate on the hot path.
//!
//! The pool does not employ work-stealing or queues of any kind. Each dispatch
//! publishes a single command to a fixed set of workers, the grid is split into
//! contiguous near-equal blocks (one per participant, the calling thread
//! included), and the caller returns once every block has been processed.
//!
//! ```
//! # #![cfg(not(loom))]
//! use core::sync::atomic::{AtomicUsize, Ordering};
//! use tessel::prelude::*;
//!
//! let pool = ThreadPool::new(4).expect("failed to start thread pool");
//! let sum = AtomicUsize::new(0);
//! pool.parallelize_2d(16, 16, Flags::empty(), |i, j| {
//!     sum.fetch_add(i * j, Ordering::Relaxed);
//! });
//! assert_eq!(sum.into_inner(), 120 * 120);
//! ```
//!
//! # Dispatch protocol
//!
//! Every dispatch advances a generation counter that the workers wait on, and
//! then waits on a countdown latch that each worker decrements once it has
//! finished its block. Waiting threads spin for a while before parking on a
//! futex, and a thread is only woken through the kernel if it actually parked.

#![no_std]

// -----------------------------------------------------------------------------
// Boilerplate for building without the standard library

extern crate alloc;
extern crate std;

// -----------------------------------------------------------------------------
// Modules

mod command;
mod compile_fail;
mod denormals;
mod flags;
mod latch;
mod padded;
mod partition;
mod signal;
mod surface;
mod thread_pool;
mod uarch;
mod unwind;

pub mod legacy;

// -----------------------------------------------------------------------------
// Top-level exports

pub use denormals::DenormalGuard;
pub use flags::Flags;
pub use partition::Grid;
pub use partition::Tile;
pub use partition::Unit;
pub use partition::Units;
pub use partition::balanced_block;
pub use surface::Parallelize;
pub use surface::Serial;
pub use thread_pool::Options;
pub use thread_pool::SPIN_WAIT_ITERATIONS;
pub use thread_pool::ThreadPool;
pub use thread_pool::ThreadPoolBuilder;
pub use thread_pool::parallelize;
pub use uarch::Homogeneous;
pub use uarch::NoDetection;
pub use uarch::UarchBounds;
pub use uarch::UarchDetector;
pub use uarch::install_uarch_detector;
pub use uarch::uarch_detector;

/// The most commonly used items, for glob import.
pub mod prelude {
    pub use crate::Flags;
    pub use crate::Grid;
    pub use crate::Options;
    pub use crate::Parallelize;
    pub use crate::Serial;
    pub use crate::ThreadPool;
    pub use crate::UarchBounds;
    pub use crate::Unit;
}

// -----------------------------------------------------------------------------
// Platform Support

// This crate uses `loom` for testing, which requires mocking all of the core
// threading primitives (`Mutex` and the like), including the futex calls.
//
// To make things a bit simpler, we re-export all the important types in the
// `platform` module.

#[cfg(not(loom))]
mod platform {

    // Core exports

    pub use alloc::sync::Arc;
    pub use core::hint::spin_loop;
    pub use core::sync::atomic::AtomicBool;
    pub use core::sync::atomic::AtomicPtr;
    pub use core::sync::atomic::AtomicU32;
    pub use core::sync::atomic::Ordering;
    pub use std::sync::Mutex;
    pub use std::thread::Builder as ThreadBuilder;
    pub use std::thread::JoinHandle;
    pub use std::thread::available_parallelism;

    // Futex operations

    /// Blocks while `atomic` still holds `expected`. May wake spuriously.
    #[inline]
    pub fn wait(atomic: &AtomicU32, expected: u32) {
        atomic_wait::wait(atomic, expected);
    }

    /// Wakes one thread blocked in [`wait`] on `atomic`.
    #[inline]
    pub fn wake_one(atomic: &AtomicU32) {
        atomic_wait::wake_one(atomic);
    }

    /// Wakes every thread blocked in [`wait`] on `atomic`.
    #[inline]
    pub fn wake_all(atomic: &AtomicU32) {
        atomic_wait::wake_all(atomic);
    }
}

#[cfg(loom)]
mod platform {

    // Core exports

    pub use loom::hint::spin_loop;
    pub use loom::sync::Arc;
    pub use loom::sync::Mutex;
    pub use loom::sync::atomic::AtomicBool;
    pub use loom::sync::atomic::AtomicPtr;
    pub use loom::sync::atomic::AtomicU32;
    pub use loom::sync::atomic::Ordering;
    pub use loom::thread::Builder as ThreadBuilder;
    pub use loom::thread::JoinHandle;

    // Available parallelism

    pub fn available_parallelism() -> std::io::Result<core::num::NonZero<usize>> {
        panic!("available_parallelism does not work on loom");
    }

    // Futex operations
    //
    // Loom cannot model a futex, so waiting degrades to yielding. Every wait
    // site re-checks its condition in a loop, which is what loom needs to
    // explore the interleavings.

    pub fn wait(_atomic: &AtomicU32, _expected: u32) {
        loom::thread::yield_now();
    }

    pub fn wake_one(_atomic: &AtomicU32) {}

    pub fn wake_all(_atomic: &AtomicU32) {}
}
