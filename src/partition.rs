//! Range partitioning for N-dimensional grids.
//!
//! A [`Grid`] describes the iteration space of one dispatch: a size for each
//! dimension and a maximum tile size for each dimension. Untiled dimensions
//! simply have a tile size of one. The grid is flattened into a sequence of
//! *units* (one task invocation each) in row-major order, and that sequence
//! is cut into contiguous near-equal blocks, one per participating thread.
//!
//! Nothing in here touches shared state; every function is pure.

use core::cmp;
use core::iter::FusedIterator;
use core::ops::Range;

// -----------------------------------------------------------------------------
// Grid

/// The shape of an N-dimensional iteration space, optionally tiled.
///
/// A dimension of size `range` with maximum tile size `tile` is covered by
/// `range.div_ceil(tile)` tiles. Tile `t` starts at `t * tile` and covers
/// `min(range - t * tile, tile)` indices, so only the final tile in a
/// dimension may be short.
///
/// Grids of 1 to 6 dimensions are supported; other arities fail to compile.
///
/// A tile size of zero is a caller error. It is not checked when the grid is
/// built; [`Grid::len`] divides by zero and panics instead. Every dispatch
/// computes the length on the calling thread before posting any work, so such
/// a grid panics there and no task is called.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Grid<const N: usize> {
    range: [usize; N],
    tile: [usize; N],
}

impl<const N: usize> Grid<N> {
    /// Creates an untiled grid with the given per-dimension sizes. The first
    /// dimension is the outermost (slowest varying) one.
    #[inline]
    pub const fn new(range: [usize; N]) -> Grid<N> {
        const { assert!(N >= 1 && N <= 6, "grids must have between 1 and 6 dimensions") };
        Grid {
            range,
            tile: [1; N],
        }
    }

    /// Sets the maximum tile size of every dimension at once.
    #[inline]
    pub const fn with_tiles(mut self, tile: [usize; N]) -> Grid<N> {
        self.tile = tile;
        self
    }

    /// Tiles the innermost dimension.
    #[inline]
    pub const fn tile_last(mut self, tile: usize) -> Grid<N> {
        self.tile[N - 1] = tile;
        self
    }

    /// Tiles the two innermost dimensions. `outer` applies to dimension
    /// `N - 2` and `inner` to dimension `N - 1`.
    #[inline]
    pub const fn tile_last_two(mut self, outer: usize, inner: usize) -> Grid<N> {
        const { assert!(N >= 2, "tiling two dimensions needs at least two dimensions") };
        self.tile[N - 2] = outer;
        self.tile[N - 1] = inner;
        self
    }

    /// Returns the size of each dimension.
    #[inline]
    pub const fn range(&self) -> [usize; N] {
        self.range
    }

    /// Returns the maximum tile size of each dimension.
    #[inline]
    pub const fn tile(&self) -> [usize; N] {
        self.tile
    }

    /// Returns the number of tiles along each dimension.
    #[inline]
    pub fn tile_counts(&self) -> [usize; N] {
        let mut counts = [0; N];
        for (dim, count) in counts.iter_mut().enumerate() {
            *count = self.range[dim].div_ceil(self.tile[dim]);
        }
        counts
    }

    /// Returns the total number of units (task invocations) in the grid.
    #[inline]
    pub fn len(&self) -> usize {
        self.tile_counts().iter().product()
    }

    /// Returns true if any dimension is empty, in which case no units exist.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.range.contains(&0)
    }

    /// Maps a flat unit index back to its tile, using a mixed-radix
    /// decomposition in which the last dimension varies fastest.
    ///
    /// The index must be less than [`Grid::len`].
    pub fn unit(&self, flat: usize) -> Tile<N> {
        debug_assert!(flat < self.len());
        let counts = self.tile_counts();
        let mut coord = [0; N];
        let mut rest = flat;
        for dim in (0..N).rev() {
            coord[dim] = rest % counts[dim];
            rest /= counts[dim];
        }
        tile_at(&self.range, &self.tile, &coord)
    }

    /// Iterates over a contiguous block of flat unit indices.
    ///
    /// Only the first unit is decomposed; the rest are reached by incrementing
    /// the per-dimension coordinates like an odometer.
    pub fn units(&self, block: Range<usize>) -> Units<N> {
        let counts = self.tile_counts();
        let remaining = block.len();
        let mut coord = [0; N];
        if remaining != 0 {
            let mut rest = block.start;
            for dim in (0..N).rev() {
                coord[dim] = rest % counts[dim];
                rest /= counts[dim];
            }
        }
        Units {
            range: self.range,
            tile: self.tile,
            counts,
            coord,
            remaining,
        }
    }

    /// Iterates over every unit of the grid in row-major order.
    pub fn iter(&self) -> Units<N> {
        self.units(0..self.len())
    }

    /// Returns the units assigned to participant `part` out of `parts`, using
    /// [`balanced_block`].
    pub fn split(&self, parts: usize, part: usize) -> Units<N> {
        self.units(balanced_block(self.len(), parts, part))
    }
}

impl<const N: usize> IntoIterator for &Grid<N> {
    type Item = Tile<N>;
    type IntoIter = Units<N>;

    fn into_iter(self) -> Units<N> {
        self.iter()
    }
}

// -----------------------------------------------------------------------------
// Block partition

/// Computes the standard balanced block partition of `total` items over
/// `parts` participants, returning the flat range owned by `part`.
///
/// Every participant gets `total / parts` items and the first
/// `total % parts` participants get one more. Blocks are contiguous and
/// appear in participant order. When `total < parts` the trailing
/// participants get empty ranges.
#[inline]
pub fn balanced_block(total: usize, parts: usize, part: usize) -> Range<usize> {
    debug_assert!(part < parts);
    let base = total / parts;
    let extra = total % parts;
    let start = part * base + cmp::min(part, extra);
    let len = base + usize::from(part < extra);
    start..start + len
}

// -----------------------------------------------------------------------------
// Tiles

/// One tile of a grid: the starting index and effective size along every
/// dimension. For untiled dimensions the size is always one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tile<const N: usize> {
    /// The first index covered by the tile, per dimension.
    pub start: [usize; N],
    /// The number of indices covered by the tile, per dimension.
    pub size: [usize; N],
}

#[inline(always)]
fn tile_at<const N: usize>(range: &[usize; N], tile: &[usize; N], coord: &[usize; N]) -> Tile<N> {
    let mut start = [0; N];
    let mut size = [0; N];
    for dim in 0..N {
        start[dim] = coord[dim] * tile[dim];
        size[dim] = cmp::min(range[dim] - start[dim], tile[dim]);
    }
    Tile { start, size }
}

/// Iterator over a contiguous block of a grid's units. See [`Grid::units`].
#[derive(Clone, Debug)]
pub struct Units<const N: usize> {
    range: [usize; N],
    tile: [usize; N],
    counts: [usize; N],
    coord: [usize; N],
    remaining: usize,
}

impl<const N: usize> Iterator for Units<N> {
    type Item = Tile<N>;

    #[inline]
    fn next(&mut self) -> Option<Tile<N>> {
        if self.remaining == 0 {
            return None;
        }
        let tile = tile_at(&self.range, &self.tile, &self.coord);
        self.remaining -= 1;
        // Advance the odometer, carrying into outer dimensions.
        for dim in (0..N).rev() {
            self.coord[dim] += 1;
            if self.coord[dim] < self.counts[dim] {
                break;
            }
            self.coord[dim] = 0;
        }
        Some(tile)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<const N: usize> ExactSizeIterator for Units<N> {}

impl<const N: usize> FusedIterator for Units<N> {}

// -----------------------------------------------------------------------------
// Units of work

/// A single task invocation, as handed to the generic task function.
///
/// `index` holds the tile start in every dimension (for untiled dimensions
/// this is just the index) and `size` the effective tile size (always one for
/// untiled dimensions). `thread` is the index of the participant running the
/// unit, and `uarch` the resolved microarchitecture index; the latter is only
/// meaningful when the dispatch asked for it, and is zero otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Unit<const N: usize> {
    /// The first index covered by the unit, per dimension.
    pub index: [usize; N],
    /// The effective tile size, per dimension.
    pub size: [usize; N],
    /// The index of the participating thread, in `0..threads_count`.
    pub thread: usize,
    /// The resolved microarchitecture index.
    pub uarch: u32,
}

impl<const N: usize> Unit<N> {
    #[inline(always)]
    pub(crate) fn new(tile: Tile<N>, thread: usize, uarch: u32) -> Unit<N> {
        Unit {
            index: tile.start,
            size: tile.size,
            thread,
            uarch,
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn twenty_items_over_four_workers() {
        let grid = Grid::new([20]);
        let blocks: Vec<_> = (0..4).map(|part| balanced_block(grid.len(), 4, part)).collect();
        assert_eq!(blocks, [0..5, 5..10, 10..15, 15..20]);
    }

    #[test]
    fn uneven_split_front_loads_the_remainder() {
        let blocks: Vec<_> = (0..4).map(|part| balanced_block(10, 4, part)).collect();
        assert_eq!(blocks, [0..3, 3..6, 6..8, 8..10]);
    }

    #[test]
    fn fewer_items_than_workers() {
        let lens: Vec<_> = (0..5).map(|part| balanced_block(3, 5, part).len()).collect();
        assert_eq!(lens, [1, 1, 1, 0, 0]);
    }

    #[test]
    fn seven_by_three_tiles() {
        let grid = Grid::new([7]).tile_last(3);
        let tiles: Vec<_> = grid.iter().map(|t| (t.start[0], t.size[0])).collect();
        assert_eq!(tiles, [(0, 3), (3, 3), (6, 1)]);
    }

    #[test]
    fn oversized_tile_collapses() {
        let grid = Grid::new([5]).tile_last(64);
        let tiles: Vec<_> = grid.iter().collect();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].start, [0]);
        assert_eq!(tiles[0].size, [5]);
    }

    #[test]
    fn empty_dimension_empties_grid() {
        let grid = Grid::new([4, 0, 3]);
        assert!(grid.is_empty());
        assert_eq!(grid.len(), 0);
        assert_eq!(grid.iter().count(), 0);
        assert_eq!(grid.split(3, 1).count(), 0);
    }

    #[test]
    fn row_major_order() {
        let grid = Grid::new([2, 3]);
        let order: Vec<_> = grid.iter().map(|t| t.start).collect();
        assert_eq!(order, [[0, 0], [0, 1], [0, 2], [1, 0], [1, 1], [1, 2]]);
    }

    #[test]
    fn odometer_matches_decomposition() {
        let grid = Grid::new([3, 2, 5, 4]).tile_last_two(2, 3);
        for start in 0..grid.len() {
            for (offset, tile) in grid.units(start..grid.len()).enumerate() {
                assert_eq!(tile, grid.unit(start + offset));
            }
        }
    }

    #[test]
    fn split_covers_every_unit_once() {
        let grid = Grid::new([3, 4, 5]).tile_last(2);
        for parts in [1, 2, 3, 7, 64] {
            let mut seen: Vec<_> = (0..parts).flat_map(|part| grid.split(parts, part)).collect();
            let expected: Vec<_> = grid.iter().collect();
            assert_eq!(seen.len(), expected.len());
            seen.sort_by_key(|t| t.start);
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn tiles_cover_range_without_gaps() {
        for range in 1..40 {
            for tile in 1..=range {
                let grid = Grid::new([range]).tile_last(tile);
                let mut next = 0;
                let tiles: Vec<_> = grid.iter().collect();
                for (i, t) in tiles.iter().enumerate() {
                    assert_eq!(t.start[0], next);
                    assert!(t.size[0] <= tile);
                    if i + 1 < tiles.len() {
                        assert_eq!(t.size[0], tile);
                    }
                    next += t.size[0];
                }
                assert_eq!(next, range);
            }
        }
    }

    #[test]
    fn every_dimension_tiled() {
        let grid = Grid::new([5, 5]).with_tiles([2, 4]);
        assert_eq!(grid.tile_counts(), [3, 2]);
        let last = grid.unit(grid.len() - 1);
        assert_eq!(last.start, [4, 4]);
        assert_eq!(last.size, [1, 1]);
    }
}
