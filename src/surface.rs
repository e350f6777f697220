//! Typed entry points for every supported grid shape.
//!
//! [`ThreadPool::parallelize`] takes a [`Grid`] and a closure over [`Unit`].
//! Most kernels know their shape statically and would rather receive plain
//! indices, so the [`Parallelize`] trait provides one method per shape that
//! adapts a closure of that shape onto the generic entry point.
//!
//! Methods are named after the grid they iterate:
//!
//! * `parallelize_{N}d` iterates an untiled N-dimensional grid and passes the
//!   N indices.
//! * `_tile_1d` and `_tile_2d` tile the one or two innermost dimensions. The
//!   closure receives the start of the tile in every dimension, followed by
//!   the effective size of each tiled dimension.
//! * `_with_thread` additionally passes the index of the participating thread
//!   first, which is handy for indexing per-thread scratch buffers.
//! * `_with_uarch` takes [`UarchBounds`] and additionally passes the resolved
//!   microarchitecture index first. Variants with both pass the
//!   microarchitecture index, then the thread index.
//!
//! ```
//! # #![cfg(not(loom))]
//! use core::sync::atomic::{AtomicUsize, Ordering};
//! use tessel::prelude::*;
//!
//! let pool = ThreadPool::new(2).expect("failed to start thread pool");
//! let covered = AtomicUsize::new(0);
//! pool.parallelize_1d_tile_1d(7, 3, Flags::empty(), |start, size| {
//!     assert!(start % 3 == 0 && size <= 3);
//!     covered.fetch_add(size, Ordering::Relaxed);
//! });
//! assert_eq!(covered.into_inner(), 7);
//! ```

// The six-dimensional tiled shapes take more arguments than clippy likes.
#![allow(clippy::too_many_arguments)]

use crate::flags::Flags;
use crate::partition::Grid;
use crate::partition::Unit;
use crate::thread_pool;
use crate::thread_pool::Options;
use crate::thread_pool::ThreadPool;
use crate::uarch::UarchBounds;

// -----------------------------------------------------------------------------
// Executors

/// Runs every dispatch on the calling thread, without a pool.
///
/// This behaves exactly like dispatching through `None::<&ThreadPool>`: units
/// run in row-major order, the thread index is always zero and the
/// microarchitecture index is always the default.
#[derive(Clone, Copy, Debug, Default)]
pub struct Serial;

impl Parallelize for ThreadPool {
    #[inline]
    fn parallelize<const N: usize, F>(&self, grid: Grid<N>, options: Options, task: F)
    where
        F: Fn(Unit<N>) + Sync,
    {
        ThreadPool::parallelize(self, grid, options, task);
    }
}

impl Parallelize for Option<&ThreadPool> {
    #[inline]
    fn parallelize<const N: usize, F>(&self, grid: Grid<N>, options: Options, task: F)
    where
        F: Fn(Unit<N>) + Sync,
    {
        thread_pool::parallelize(*self, grid, options, task);
    }
}

impl Parallelize for Serial {
    #[inline]
    fn parallelize<const N: usize, F>(&self, grid: Grid<N>, options: Options, task: F)
    where
        F: Fn(Unit<N>) + Sync,
    {
        thread_pool::parallelize_serial(grid, options, task);
    }
}

#[inline(always)]
fn with_uarch(uarch: UarchBounds, flags: Flags) -> Options {
    Options {
        flags,
        uarch: Some(uarch),
    }
}

// -----------------------------------------------------------------------------
// Typed entry points

/// Something that can execute a parallel loop over a grid.
///
/// Only [`Parallelize::parallelize`] must be implemented; every other method
/// is a typed adapter over it. Each call blocks until the whole grid has been
/// processed. If any dimension has size zero the task is never called.
pub trait Parallelize {
    /// Calls `task` once for every unit of `grid`.
    fn parallelize<const N: usize, F>(&self, grid: Grid<N>, options: Options, task: F)
    where
        F: Fn(Unit<N>) + Sync;

    // --- One dimension

    /// Calls `task(i)` for every `i` in `0..range`.
    fn parallelize_1d<F>(&self, range: usize, flags: Flags, task: F)
    where
        F: Fn(usize) + Sync,
    {
        self.parallelize(Grid::new([range]), flags.into(), move |u: Unit<1>| {
            task(u.index[0]);
        });
    }

    /// Calls `task(thread, i)` for every `i` in `0..range`.
    fn parallelize_1d_with_thread<F>(&self, range: usize, flags: Flags, task: F)
    where
        F: Fn(usize, usize) + Sync,
    {
        self.parallelize(Grid::new([range]), flags.into(), move |u: Unit<1>| {
            task(u.thread, u.index[0]);
        });
    }

    /// Calls `task(uarch, i)` for every `i` in `0..range`.
    fn parallelize_1d_with_uarch<F>(&self, uarch: UarchBounds, range: usize, flags: Flags, task: F)
    where
        F: Fn(u32, usize) + Sync,
    {
        self.parallelize(Grid::new([range]), with_uarch(uarch, flags), move |u: Unit<1>| {
            task(u.uarch, u.index[0]);
        });
    }

    /// Calls `task(start, size)` for every tile of `0..range`.
    fn parallelize_1d_tile_1d<F>(&self, range: usize, tile: usize, flags: Flags, task: F)
    where
        F: Fn(usize, usize) + Sync,
    {
        let grid = Grid::new([range]).tile_last(tile);
        self.parallelize(grid, flags.into(), move |u: Unit<1>| {
            task(u.index[0], u.size[0]);
        });
    }

    // --- Two dimensions

    /// Calls `task(i, j)` for every index pair.
    fn parallelize_2d<F>(&self, range_i: usize, range_j: usize, flags: Flags, task: F)
    where
        F: Fn(usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j]);
        self.parallelize(grid, flags.into(), move |u: Unit<2>| {
            let [i, j] = u.index;
            task(i, j);
        });
    }

    /// Calls `task(thread, i, j)` for every index pair.
    fn parallelize_2d_with_thread<F>(&self, range_i: usize, range_j: usize, flags: Flags, task: F)
    where
        F: Fn(usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j]);
        self.parallelize(grid, flags.into(), move |u: Unit<2>| {
            let [i, j] = u.index;
            task(u.thread, i, j);
        });
    }

    /// Calls `task(i, start_j, size_j)`, tiling the inner dimension.
    fn parallelize_2d_tile_1d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        tile_j: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j]).tile_last(tile_j);
        self.parallelize(grid, flags.into(), move |u: Unit<2>| {
            let [i, j] = u.index;
            task(i, j, u.size[1]);
        });
    }

    /// Calls `task(uarch, i, start_j, size_j)`, tiling the inner dimension.
    fn parallelize_2d_tile_1d_with_uarch<F>(
        &self,
        uarch: UarchBounds,
        range_i: usize,
        range_j: usize,
        tile_j: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(u32, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j]).tile_last(tile_j);
        self.parallelize(grid, with_uarch(uarch, flags), move |u: Unit<2>| {
            let [i, j] = u.index;
            task(u.uarch, i, j, u.size[1]);
        });
    }

    /// Calls `task(uarch, thread, i, start_j, size_j)`, tiling the inner
    /// dimension.
    fn parallelize_2d_tile_1d_with_uarch_with_thread<F>(
        &self,
        uarch: UarchBounds,
        range_i: usize,
        range_j: usize,
        tile_j: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(u32, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j]).tile_last(tile_j);
        self.parallelize(grid, with_uarch(uarch, flags), move |u: Unit<2>| {
            let [i, j] = u.index;
            task(u.uarch, u.thread, i, j, u.size[1]);
        });
    }

    /// Calls `task(start_i, start_j, size_i, size_j)`, tiling both dimensions.
    fn parallelize_2d_tile_2d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        tile_i: usize,
        tile_j: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j]).tile_last_two(tile_i, tile_j);
        self.parallelize(grid, flags.into(), move |u: Unit<2>| {
            let [i, j] = u.index;
            let [size_i, size_j] = u.size;
            task(i, j, size_i, size_j);
        });
    }

    /// Calls `task(uarch, start_i, start_j, size_i, size_j)`, tiling both
    /// dimensions.
    fn parallelize_2d_tile_2d_with_uarch<F>(
        &self,
        uarch: UarchBounds,
        range_i: usize,
        range_j: usize,
        tile_i: usize,
        tile_j: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(u32, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j]).tile_last_two(tile_i, tile_j);
        self.parallelize(grid, with_uarch(uarch, flags), move |u: Unit<2>| {
            let [i, j] = u.index;
            let [size_i, size_j] = u.size;
            task(u.uarch, i, j, size_i, size_j);
        });
    }

    // --- Three dimensions

    /// Calls `task(i, j, k)` for every index triple.
    fn parallelize_3d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k]);
        self.parallelize(grid, flags.into(), move |u: Unit<3>| {
            let [i, j, k] = u.index;
            task(i, j, k);
        });
    }

    /// Calls `task(i, j, start_k, size_k)`, tiling the innermost dimension.
    fn parallelize_3d_tile_1d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        tile_k: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k]).tile_last(tile_k);
        self.parallelize(grid, flags.into(), move |u: Unit<3>| {
            let [i, j, k] = u.index;
            task(i, j, k, u.size[2]);
        });
    }

    /// Calls `task(thread, i, j, start_k, size_k)`, tiling the innermost
    /// dimension.
    fn parallelize_3d_tile_1d_with_thread<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        tile_k: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k]).tile_last(tile_k);
        self.parallelize(grid, flags.into(), move |u: Unit<3>| {
            let [i, j, k] = u.index;
            task(u.thread, i, j, k, u.size[2]);
        });
    }

    /// Calls `task(uarch, i, j, start_k, size_k)`, tiling the innermost
    /// dimension.
    fn parallelize_3d_tile_1d_with_uarch<F>(
        &self,
        uarch: UarchBounds,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        tile_k: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(u32, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k]).tile_last(tile_k);
        self.parallelize(grid, with_uarch(uarch, flags), move |u: Unit<3>| {
            let [i, j, k] = u.index;
            task(u.uarch, i, j, k, u.size[2]);
        });
    }

    /// Calls `task(uarch, thread, i, j, start_k, size_k)`, tiling the
    /// innermost dimension.
    fn parallelize_3d_tile_1d_with_uarch_with_thread<F>(
        &self,
        uarch: UarchBounds,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        tile_k: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(u32, usize, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k]).tile_last(tile_k);
        self.parallelize(grid, with_uarch(uarch, flags), move |u: Unit<3>| {
            let [i, j, k] = u.index;
            task(u.uarch, u.thread, i, j, k, u.size[2]);
        });
    }

    /// Calls `task(i, start_j, start_k, size_j, size_k)`, tiling the two
    /// innermost dimensions.
    fn parallelize_3d_tile_2d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        tile_j: usize,
        tile_k: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k]).tile_last_two(tile_j, tile_k);
        self.parallelize(grid, flags.into(), move |u: Unit<3>| {
            let [i, j, k] = u.index;
            task(i, j, k, u.size[1], u.size[2]);
        });
    }

    /// Calls `task(uarch, i, start_j, start_k, size_j, size_k)`, tiling the
    /// two innermost dimensions.
    fn parallelize_3d_tile_2d_with_uarch<F>(
        &self,
        uarch: UarchBounds,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        tile_j: usize,
        tile_k: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(u32, usize, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k]).tile_last_two(tile_j, tile_k);
        self.parallelize(grid, with_uarch(uarch, flags), move |u: Unit<3>| {
            let [i, j, k] = u.index;
            task(u.uarch, i, j, k, u.size[1], u.size[2]);
        });
    }

    // --- Four dimensions

    /// Calls `task(i, j, k, l)` for every index tuple.
    fn parallelize_4d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        range_l: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k, range_l]);
        self.parallelize(grid, flags.into(), move |u: Unit<4>| {
            let [i, j, k, l] = u.index;
            task(i, j, k, l);
        });
    }

    /// Calls `task(i, j, k, start_l, size_l)`, tiling the innermost dimension.
    fn parallelize_4d_tile_1d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        range_l: usize,
        tile_l: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k, range_l]).tile_last(tile_l);
        self.parallelize(grid, flags.into(), move |u: Unit<4>| {
            let [i, j, k, l] = u.index;
            task(i, j, k, l, u.size[3]);
        });
    }

    /// Calls `task(i, j, start_k, start_l, size_k, size_l)`, tiling the two
    /// innermost dimensions.
    fn parallelize_4d_tile_2d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        range_l: usize,
        tile_k: usize,
        tile_l: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k, range_l]).tile_last_two(tile_k, tile_l);
        self.parallelize(grid, flags.into(), move |u: Unit<4>| {
            let [i, j, k, l] = u.index;
            task(i, j, k, l, u.size[2], u.size[3]);
        });
    }

    /// Calls `task(uarch, i, j, start_k, start_l, size_k, size_l)`, tiling the
    /// two innermost dimensions.
    fn parallelize_4d_tile_2d_with_uarch<F>(
        &self,
        uarch: UarchBounds,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        range_l: usize,
        tile_k: usize,
        tile_l: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(u32, usize, usize, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k, range_l]).tile_last_two(tile_k, tile_l);
        self.parallelize(grid, with_uarch(uarch, flags), move |u: Unit<4>| {
            let [i, j, k, l] = u.index;
            task(u.uarch, i, j, k, l, u.size[2], u.size[3]);
        });
    }

    // --- Five dimensions

    /// Calls `task(i, j, k, l, m)` for every index tuple.
    fn parallelize_5d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        range_l: usize,
        range_m: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k, range_l, range_m]);
        self.parallelize(grid, flags.into(), move |u: Unit<5>| {
            let [i, j, k, l, m] = u.index;
            task(i, j, k, l, m);
        });
    }

    /// Calls `task(i, j, k, l, start_m, size_m)`, tiling the innermost
    /// dimension.
    fn parallelize_5d_tile_1d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        range_l: usize,
        range_m: usize,
        tile_m: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k, range_l, range_m]).tile_last(tile_m);
        self.parallelize(grid, flags.into(), move |u: Unit<5>| {
            let [i, j, k, l, m] = u.index;
            task(i, j, k, l, m, u.size[4]);
        });
    }

    /// Calls `task(i, j, k, start_l, start_m, size_l, size_m)`, tiling the two
    /// innermost dimensions.
    fn parallelize_5d_tile_2d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        range_l: usize,
        range_m: usize,
        tile_l: usize,
        tile_m: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k, range_l, range_m])
            .tile_last_two(tile_l, tile_m);
        self.parallelize(grid, flags.into(), move |u: Unit<5>| {
            let [i, j, k, l, m] = u.index;
            task(i, j, k, l, m, u.size[3], u.size[4]);
        });
    }

    // --- Six dimensions

    /// Calls `task(i, j, k, l, m, n)` for every index tuple.
    fn parallelize_6d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        range_l: usize,
        range_m: usize,
        range_n: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k, range_l, range_m, range_n]);
        self.parallelize(grid, flags.into(), move |u: Unit<6>| {
            let [i, j, k, l, m, n] = u.index;
            task(i, j, k, l, m, n);
        });
    }

    /// Calls `task(i, j, k, l, m, start_n, size_n)`, tiling the innermost
    /// dimension.
    fn parallelize_6d_tile_1d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        range_l: usize,
        range_m: usize,
        range_n: usize,
        tile_n: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize, usize, usize, usize) + Sync,
    {
        let grid =
            Grid::new([range_i, range_j, range_k, range_l, range_m, range_n]).tile_last(tile_n);
        self.parallelize(grid, flags.into(), move |u: Unit<6>| {
            let [i, j, k, l, m, n] = u.index;
            task(i, j, k, l, m, n, u.size[5]);
        });
    }

    /// Calls `task(i, j, k, l, start_m, start_n, size_m, size_n)`, tiling the
    /// two innermost dimensions.
    fn parallelize_6d_tile_2d<F>(
        &self,
        range_i: usize,
        range_j: usize,
        range_k: usize,
        range_l: usize,
        range_m: usize,
        range_n: usize,
        tile_m: usize,
        tile_n: usize,
        flags: Flags,
        task: F,
    ) where
        F: Fn(usize, usize, usize, usize, usize, usize, usize, usize) + Sync,
    {
        let grid = Grid::new([range_i, range_j, range_k, range_l, range_m, range_n])
            .tile_last_two(tile_m, tile_n);
        self.parallelize(grid, flags.into(), move |u: Unit<6>| {
            let [i, j, k, l, m, n] = u.index;
            task(i, j, k, l, m, n, u.size[4], u.size[5]);
        });
    }
}
