//! This module contains the api and worker logic for the Tessel thread pool.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::mem;
use core::num::NonZero;
use core::ptr;
use std::io;

use tracing::debug;
use tracing::trace;
use tracing::trace_span;

use crate::command::Command;
use crate::command::Dispatch;
use crate::command::Participant;
use crate::denormals::DenormalGuard;
use crate::flags::Flags;
use crate::latch::CountLatch;
use crate::partition::Grid;
use crate::partition::Unit;
use crate::platform::*;
use crate::signal::Signal;
use crate::signal::WaitStrategy;
use crate::uarch;
use crate::uarch::SharedDetector;
use crate::uarch::UarchBounds;
use crate::unwind;
use crate::unwind::AbortOnDrop;
use crate::unwind::PanicSlot;

// -----------------------------------------------------------------------------
// Thread pool types

/// The number of times a waiting thread polls before it parks on a futex.
pub const SPIN_WAIT_ITERATIONS: u32 = 1_000_000;

/// The `ThreadPool` object owns a fixed set of worker threads and dispatches
/// parallel loops onto them. It is the main entry point to using `Tessel`.
///
/// # Creating Thread Pools
///
/// A pool is created with a fixed number of threads, which never changes. To
/// create a pool with one thread per logical processor, pass zero.
///
/// ```
/// # #![cfg(not(loom))]
/// # use tessel::prelude::*;
/// let pool = ThreadPool::new(0).expect("failed to start thread pool");
/// assert!(pool.threads_count() >= 1);
/// ```
///
/// Creation either starts every thread or none of them: if a thread fails to
/// spawn, the ones already started are shut down again and no pool is
/// returned. Use [`ThreadPool::builder`] for more control.
///
/// # Participants
///
/// The thread that dispatches work always takes part in it. A pool of `n`
/// threads therefore spawns `n - 1` workers, and every dispatch is split
/// across exactly `n` participants. The dispatching thread has index zero and
/// the workers have indices `1..n`.
///
/// # Dispatching
///
/// Work is submitted with [`ThreadPool::parallelize`] or one of the typed
/// entry points on the [`Parallelize`](crate::Parallelize) trait. Each call
/// blocks until every unit of the grid has been processed. Calls from several
/// threads on the same pool are serialized: only one dispatch is in flight at
/// a time.
///
/// # Destroying Thread Pools
///
/// Dropping the pool signals every worker to exit and joins them. Because
/// dispatching borrows the pool, it is impossible to drop it while a dispatch
/// is in flight.
pub struct ThreadPool {
    /// State shared with the workers.
    shared: Arc<Shared>,
    /// Serializes dispatchers.
    dispatch_lock: Mutex<()>,
    /// Join handles for the managed worker threads, in index order.
    workers: Vec<JoinHandle<()>>,
}

/// The state shared between the dispatcher and the workers.
struct Shared {
    /// Total number of participants, including the dispatching thread.
    threads: usize,
    /// Polls performed by a spinning waiter before it parks.
    spin_iterations: u32,
    /// Advanced once per posted command.
    signal: Signal,
    /// Counts workers that have not yet finished the current command.
    done: CountLatch,
    /// Counts workers that have not yet started.
    startup: CountLatch,
    /// Points to the current command on the dispatcher's stack. Only valid
    /// between posting a generation and the `done` latch completing.
    command: AtomicPtr<Command>,
    /// Tells the workers to exit when they observe the next generation.
    halt: AtomicBool,
    /// The first panic raised by a participant of the current dispatch.
    panics: PanicSlot,
    /// Identifies the core a participant is running on.
    detector: SharedDetector,
}

/// Per-dispatch options for [`ThreadPool::parallelize`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// Hints applied to the dispatch.
    pub flags: Flags,
    /// When set, every participant resolves a microarchitecture index within
    /// these bounds and passes it to the task as [`Unit::uarch`].
    pub uarch: Option<UarchBounds>,
}

impl Options {
    /// Creates options with no flags and no microarchitecture resolution.
    #[inline]
    pub const fn new() -> Options {
        Options {
            flags: Flags::empty(),
            uarch: None,
        }
    }

    /// Sets the dispatch flags.
    #[inline]
    pub const fn with_flags(mut self, flags: Flags) -> Options {
        self.flags = flags;
        self
    }

    /// Requests microarchitecture resolution with the given bounds.
    #[inline]
    pub const fn with_uarch(mut self, default: u32, max: u32) -> Options {
        self.uarch = Some(UarchBounds::new(default, max));
        self
    }
}

impl From<Flags> for Options {
    fn from(flags: Flags) -> Options {
        Options::new().with_flags(flags)
    }
}

// -----------------------------------------------------------------------------
// Thread pool builder

/// Configures and creates a [`ThreadPool`].
pub struct ThreadPoolBuilder {
    num_threads: usize,
    thread_name: Option<Box<dyn FnMut(usize) -> String>>,
    stack_size: Option<usize>,
    spin_iterations: u32,
    detector: Option<SharedDetector>,
}

impl Default for ThreadPoolBuilder {
    fn default() -> ThreadPoolBuilder {
        ThreadPoolBuilder::new()
    }
}

impl ThreadPoolBuilder {
    /// Creates a builder with the default configuration: one thread per
    /// logical processor, [`SPIN_WAIT_ITERATIONS`] spins, and the
    /// process-wide microarchitecture detector.
    pub fn new() -> ThreadPoolBuilder {
        ThreadPoolBuilder {
            num_threads: 0,
            thread_name: None,
            stack_size: None,
            spin_iterations: SPIN_WAIT_ITERATIONS,
            detector: None,
        }
    }

    /// Sets the number of participants. Zero (the default) means one per
    /// logical processor, or one if that cannot be determined.
    pub fn num_threads(mut self, num_threads: usize) -> ThreadPoolBuilder {
        self.num_threads = num_threads;
        self
    }

    /// Sets a closure that names each worker thread, given its index.
    pub fn thread_name<F>(mut self, thread_name: F) -> ThreadPoolBuilder
    where
        F: FnMut(usize) -> String + 'static,
    {
        self.thread_name = Some(Box::new(thread_name));
        self
    }

    /// Sets the stack size of the worker threads.
    pub fn stack_size(mut self, stack_size: usize) -> ThreadPoolBuilder {
        self.stack_size = Some(stack_size);
        self
    }

    /// Sets how many times a waiting thread polls before parking. Zero makes
    /// every wait a kernel wait.
    pub fn spin_iterations(mut self, spin_iterations: u32) -> ThreadPoolBuilder {
        self.spin_iterations = spin_iterations;
        self
    }

    /// Sets the microarchitecture detector used by this pool.
    pub fn uarch_detector(mut self, detector: SharedDetector) -> ThreadPoolBuilder {
        self.detector = Some(detector);
        self
    }

    /// Creates the pool, starting all of its worker threads.
    ///
    /// If any thread fails to spawn, the threads already started are halted
    /// and joined, and the spawn error is returned. The same teardown happens
    /// if the `thread_name` callback panics. A name containing a NUL byte is
    /// rejected with [`io::ErrorKind::InvalidInput`].
    #[cold]
    pub fn build(mut self) -> io::Result<ThreadPool> {
        let threads = match self.num_threads {
            0 => available_parallelism().map(NonZero::get).unwrap_or(1),
            num_threads => num_threads,
        };

        let Ok(num_workers) = u32::try_from(threads - 1) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "too many threads requested",
            ));
        };

        debug!("creating thread pool with {} thread(s)", threads);

        let shared = Arc::new(Shared {
            threads,
            spin_iterations: self.spin_iterations,
            signal: Signal::new(),
            done: CountLatch::new(),
            startup: CountLatch::new(),
            command: AtomicPtr::new(ptr::null_mut()),
            halt: AtomicBool::new(false),
            panics: PanicSlot::new(),
            detector: self.detector.take().unwrap_or_else(uarch::uarch_detector),
        });

        shared.startup.arm(num_workers);

        // Dropping the guard before it is finished halts and joins whatever
        // has been spawned so far, including when the loop below unwinds.
        let mut spawned = SpawnGuard {
            shared: &shared,
            workers: Vec::with_capacity(threads - 1),
        };

        // The dispatching thread is participant zero, so workers start at one.
        for index in 1..threads {
            let name = match &mut self.thread_name {
                Some(thread_name) => thread_name(index),
                None => format!("tessel worker {index}"),
            };

            if name.contains('\0') {
                debug!("rejecting name of worker {}: contains a NUL byte", index);
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "thread name contains a NUL byte",
                ));
            }

            let mut builder = ThreadBuilder::new().name(name);
            if let Some(stack_size) = self.stack_size {
                builder = builder.stack_size(stack_size);
            }

            debug!("spawning managed worker with index {}", index);
            let worker_shared = shared.clone();
            match builder.spawn(move || managed_worker(worker_shared, index)) {
                Ok(handle) => spawned.workers.push(handle),
                Err(error) => {
                    debug!("failed to spawn worker {}: {}", index, error);
                    return Err(error);
                }
            }
        }

        let workers = spawned.finish();

        // Wait for the threads to start.
        shared.startup.wait(0);

        debug!("completed thread pool creation");

        Ok(ThreadPool {
            shared,
            dispatch_lock: Mutex::new(()),
            workers,
        })
    }
}

// -----------------------------------------------------------------------------
// Thread pool creation and destruction

impl ThreadPool {
    /// Creates a pool with `threads` participants (zero means one per logical
    /// processor). Returns `None` if any worker thread fails to start.
    ///
    /// See [`ThreadPool::try_new`] to get at the underlying error.
    pub fn new(threads: usize) -> Option<ThreadPool> {
        ThreadPool::try_new(threads).ok()
    }

    /// Creates a pool with `threads` participants (zero means one per logical
    /// processor), returning the spawn error on failure.
    pub fn try_new(threads: usize) -> io::Result<ThreadPool> {
        ThreadPoolBuilder::new().num_threads(threads).build()
    }

    /// Returns a builder for configuring a new pool.
    pub fn builder() -> ThreadPoolBuilder {
        ThreadPoolBuilder::new()
    }

    /// Returns the number of participants in every dispatch: the worker
    /// threads plus the dispatching thread.
    #[inline]
    pub fn threads_count(&self) -> usize {
        self.shared.threads
    }

    /// Halts and joins every worker thread. This is equivalent to dropping the
    /// pool.
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        debug!("destroying thread pool");
        shutdown(&self.shared, mem::take(&mut self.workers));
        debug!("completed thread pool destruction");
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("threads", &self.shared.threads)
            .finish_non_exhaustive()
    }
}

/// Owns the workers of a pool that is still being built, and shuts them down
/// unless [`SpawnGuard::finish`] is reached.
struct SpawnGuard<'a> {
    shared: &'a Shared,
    workers: Vec<JoinHandle<()>>,
}

impl SpawnGuard<'_> {
    fn finish(mut self) -> Vec<JoinHandle<()>> {
        let workers = mem::take(&mut self.workers);
        mem::forget(self);
        workers
    }
}

impl Drop for SpawnGuard<'_> {
    fn drop(&mut self) {
        debug!("abandoning thread pool creation");
        shutdown(self.shared, mem::take(&mut self.workers));
    }
}

/// Tells every worker to exit and waits for them to do so.
#[cold]
fn shutdown(shared: &Shared, workers: Vec<JoinHandle<()>>) {
    shared.halt.store(true, Ordering::Relaxed);
    // Posting publishes the halt flag and wakes any parked worker.
    shared.signal.post();
    for handle in workers {
        let _ = handle.join();
    }
}

// -----------------------------------------------------------------------------
// Dispatch

impl ThreadPool {
    /// Calls `task` once for every unit of `grid`, spread across the pool, and
    /// returns once all of them have completed.
    ///
    /// The units are split into contiguous near-equal blocks in row-major
    /// order, one block per participant; see [`Grid::split`]. No ordering is
    /// guaranteed between units.
    ///
    /// If the grid is empty this returns immediately without calling `task`.
    /// If `task` panics, the remaining participants still finish their blocks,
    /// and the first panic is then resumed on the calling thread.
    pub fn parallelize<const N: usize, F>(&self, grid: Grid<N>, options: Options, task: F)
    where
        F: Fn(Unit<N>) + Sync,
    {
        if grid.is_empty() {
            return;
        }

        // Panics here on a zero tile size, before anything is posted.
        let units = grid.len();

        let span = trace_span!("parallelize", dims = N, units);
        let _enter = span.enter();

        let dispatch = Dispatch::new(grid, options.uarch, &task);

        // SAFETY: The dispatch lives on this stack frame until the end of the
        // function, and the command is only published between `post` and the
        // completion of the `done` latch, after which no worker touches it.
        // Neither the caller's share nor the wait can unwind past this frame:
        // `Command::execute` catches panics, and anything else aborts.
        let command = unsafe { dispatch.as_command(options.flags) };

        // Only one command may be in flight at a time. A poisoned lock only
        // means a previous task panicked after the barrier had completed.
        let guard = match self.dispatch_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let shared = &*self.shared;
        let participant = Participant {
            index: 0,
            count: shared.threads,
            detector: &*shared.detector,
        };

        if shared.threads == 1 {
            command.execute(&participant, &shared.panics);
        } else {
            let abort_guard = AbortOnDrop;

            shared.done.arm((shared.threads - 1) as u32);
            shared
                .command
                .store(ptr::from_ref(&command).cast_mut(), Ordering::Relaxed);
            let generation = shared.signal.post();
            trace!("posted generation {}", generation);

            command.execute(&participant, &shared.panics);

            shared.done.wait(shared.spin_iterations);
            shared.command.store(ptr::null_mut(), Ordering::Relaxed);
            trace!("completed generation {}", generation);

            mem::forget(abort_guard);
        }

        let panic = shared.panics.take();
        drop(guard);

        if let Some(payload) = panic {
            unwind::resume_unwinding(payload);
        }
    }
}

/// Calls `task` once for every unit of `grid`. With a pool this is
/// [`ThreadPool::parallelize`]; without one, every unit runs on the calling
/// thread, in row-major order.
///
/// The serial path passes thread index zero to every unit and always uses the
/// default microarchitecture index. It honours
/// [`Flags::DISABLE_DENORMALS`]; [`Flags::YIELD_WORKERS`] has no effect.
pub fn parallelize<const N: usize, F>(
    pool: Option<&ThreadPool>,
    grid: Grid<N>,
    options: Options,
    task: F,
) where
    F: Fn(Unit<N>) + Sync,
{
    match pool {
        Some(pool) => pool.parallelize(grid, options, task),
        None => parallelize_serial(grid, options, task),
    }
}

/// Runs every unit of `grid` on the calling thread.
pub(crate) fn parallelize_serial<const N: usize, F>(grid: Grid<N>, options: Options, task: F)
where
    F: Fn(Unit<N>),
{
    if grid.is_empty() {
        return;
    }

    let _denormals = options
        .flags
        .contains(Flags::DISABLE_DENORMALS)
        .then(DenormalGuard::new);

    let uarch = options.uarch.map_or(0, |bounds| bounds.default);
    for tile in grid.iter() {
        task(Unit::new(tile, 0, uarch));
    }
}

// -----------------------------------------------------------------------------
// Main worker loop

/// This is the main loop for a worker thread. It waits for a command to be
/// posted, runs its share of the command, reports completion, and repeats
/// until the pool tells it to halt.
fn managed_worker(shared: Arc<Shared>, index: usize) {
    trace!("starting managed worker {}", index);

    // The worker loop never unwinds: task panics are captured by
    // `Command::execute`. Anything else means the protocol is broken and the
    // dispatcher would wait forever.
    let abort_guard = AbortOnDrop;

    let participant = Participant {
        index,
        count: shared.threads,
        detector: &*shared.detector,
    };

    // Nothing can be posted before every worker has started, so the first
    // generation this worker waits past is always the initial one.
    let mut seen = 0;
    let mut strategy = WaitStrategy::Spinning;

    shared.startup.count_down();

    loop {
        seen = shared.signal.wait(seen, strategy, shared.spin_iterations);

        if shared.halt.load(Ordering::Relaxed) {
            break;
        }

        // SAFETY: The dispatcher stores the command before posting the
        // generation we just observed, and keeps it alive until we count down
        // the `done` latch below.
        let command = unsafe { &*shared.command.load(Ordering::Relaxed) };
        let flags = command.flags();

        command.execute(&participant, &shared.panics);

        let next = WaitStrategy::after(flags);
        if next != strategy {
            trace!("worker {} switching to {:?} wait", index, next);
            strategy = next;
        }

        // The command may dangle as soon as this returns.
        shared.done.count_down();
    }

    mem::forget(abort_guard);

    trace!("exiting managed worker {}", index);
}
