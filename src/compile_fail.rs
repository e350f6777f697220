//! Contains a set of compile failure doctests.

// -----------------------------------------------------------------------------
// Ensures tasks that are not `Sync` cannot be dispatched.

/** ```compile_fail,E0277

use std::cell::Cell;
use tessel::prelude::*;

let pool = ThreadPool::new(2).unwrap();
let count = Cell::new(0);
pool.parallelize_1d(16, Flags::empty(), |_| count.set(count.get() + 1)); //~ ERROR

``` */
mod nonsync_capture {}

/** ```compile_fail,E0277

use std::rc::Rc;
use tessel::prelude::*;

let pool = ThreadPool::new(2).unwrap();
let shared = Rc::new(22);
pool.parallelize(Grid::new([4, 4]), Options::new(), |_| {
    let _ = shared.clone(); //~ ERROR
});

``` */
mod nonsync_generic_capture {}

// The serial path has the same requirement, so code does not break when a pool
// is swapped in.

/** ```compile_fail,E0277

use std::cell::Cell;
use tessel::prelude::*;

let count = Cell::new(0);
Serial.parallelize_1d(16, Flags::empty(), |_| count.set(count.get() + 1)); //~ ERROR

``` */
mod nonsync_serial_capture {}

// -----------------------------------------------------------------------------
// Ensures tasks cannot mutate captured state without synchronization.

/** ```compile_fail,E0594

use tessel::prelude::*;

let pool = ThreadPool::new(2).unwrap();
let mut count = 0;
pool.parallelize_1d(16, Flags::empty(), |_| count += 1); //~ ERROR

``` */
mod unsynchronized_mutation {}

// -----------------------------------------------------------------------------
// Ensures grids of unsupported arity are rejected.

/** ```compile_fail

use tessel::Grid;

let grid = Grid::new([1, 2, 3, 4, 5, 6, 7]); //~ ERROR

``` */
mod seven_dimensions {}

/** ```compile_fail

use tessel::Grid;

let grid = Grid::new([3]).tile_last_two(1, 1); //~ ERROR

``` */
mod two_tiles_in_one_dimension {}

// -----------------------------------------------------------------------------
// Ensures the pool cannot be destroyed while a dispatch borrows it.

/** ```compile_fail

use tessel::prelude::*;

let pool = ThreadPool::new(2).unwrap();
pool.parallelize_1d(4, Flags::empty(), |_| drop(pool)); //~ ERROR

``` */
mod destroy_during_dispatch {}
