//! Deprecated fixed-arity entry points.
//!
//! These predate the [`Parallelize`](crate::Parallelize) surface and are kept
//! only for callers that have not migrated. Each one forwards to
//! [`parallelize`](crate::parallelize) with no flags. Unlike the modern tiled
//! entry points, the tiled forms here tile *every* dimension.
//!
//! Passing `None` as the pool runs the loop on the calling thread.

use crate::flags::Flags;
use crate::partition::Grid;
use crate::partition::Unit;
use crate::thread_pool;
use crate::thread_pool::Options;
use crate::thread_pool::ThreadPool;

#[inline(always)]
fn forward<const N: usize, F>(pool: Option<&ThreadPool>, grid: Grid<N>, task: F)
where
    F: Fn(Unit<N>) + Sync,
{
    thread_pool::parallelize(pool, grid, Options::from(Flags::empty()), task);
}

/// Calls `task(i)` for every `i` in `0..range`.
#[deprecated(note = "use `Parallelize::parallelize_1d`")]
pub fn compute_1d<F>(pool: Option<&ThreadPool>, range: usize, task: F)
where
    F: Fn(usize) + Sync,
{
    forward(pool, Grid::new([range]), move |u: Unit<1>| task(u.index[0]));
}

/// Calls `task(start, size)` for every tile of `0..range`.
#[deprecated(note = "use `Parallelize::parallelize_1d_tile_1d`")]
pub fn compute_1d_tiled<F>(pool: Option<&ThreadPool>, range: usize, tile: usize, task: F)
where
    F: Fn(usize, usize) + Sync,
{
    forward(pool, Grid::new([range]).with_tiles([tile]), move |u: Unit<1>| {
        task(u.index[0], u.size[0]);
    });
}

/// Calls `task(i, j)` for every index pair.
#[deprecated(note = "use `Parallelize::parallelize_2d`")]
pub fn compute_2d<F>(pool: Option<&ThreadPool>, range_i: usize, range_j: usize, task: F)
where
    F: Fn(usize, usize) + Sync,
{
    forward(pool, Grid::new([range_i, range_j]), move |u: Unit<2>| {
        let [i, j] = u.index;
        task(i, j);
    });
}

/// Calls `task(start_i, start_j, size_i, size_j)` for every tile.
#[deprecated(note = "use `Parallelize::parallelize_2d_tile_2d`")]
pub fn compute_2d_tiled<F>(
    pool: Option<&ThreadPool>,
    range_i: usize,
    range_j: usize,
    tile_i: usize,
    tile_j: usize,
    task: F,
) where
    F: Fn(usize, usize, usize, usize) + Sync,
{
    let grid = Grid::new([range_i, range_j]).with_tiles([tile_i, tile_j]);
    forward(pool, grid, move |u: Unit<2>| {
        let [i, j] = u.index;
        let [size_i, size_j] = u.size;
        task(i, j, size_i, size_j);
    });
}

/// Calls `task(start_i, start_j, start_k, size_i, size_j, size_k)` for every
/// tile.
#[deprecated(note = "use `Parallelize::parallelize_3d_tile_2d`")]
#[allow(clippy::too_many_arguments)]
pub fn compute_3d_tiled<F>(
    pool: Option<&ThreadPool>,
    range_i: usize,
    range_j: usize,
    range_k: usize,
    tile_i: usize,
    tile_j: usize,
    tile_k: usize,
    task: F,
) where
    F: Fn(usize, usize, usize, usize, usize, usize) + Sync,
{
    let grid = Grid::new([range_i, range_j, range_k]).with_tiles([tile_i, tile_j, tile_k]);
    forward(pool, grid, move |u: Unit<3>| {
        let [i, j, k] = u.index;
        let [size_i, size_j, size_k] = u.size;
        task(i, j, k, size_i, size_j, size_k);
    });
}

/// Calls `task(start_i, start_j, start_k, start_l, size_i, size_j, size_k,
/// size_l)` for every tile.
#[deprecated(note = "use `Parallelize::parallelize_4d_tile_2d`")]
#[allow(clippy::too_many_arguments)]
pub fn compute_4d_tiled<F>(
    pool: Option<&ThreadPool>,
    range_i: usize,
    range_j: usize,
    range_k: usize,
    range_l: usize,
    tile_i: usize,
    tile_j: usize,
    tile_k: usize,
    tile_l: usize,
    task: F,
) where
    F: Fn(usize, usize, usize, usize, usize, usize, usize, usize) + Sync,
{
    let grid = Grid::new([range_i, range_j, range_k, range_l])
        .with_tiles([tile_i, tile_j, tile_k, tile_l]);
    forward(pool, grid, move |u: Unit<4>| {
        let [i, j, k, l] = u.index;
        let [size_i, size_j, size_k, size_l] = u.size;
        task(i, j, k, l, size_i, size_j, size_k, size_l);
    });
}
