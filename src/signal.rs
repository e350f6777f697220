//! This module defines the signal used to tell workers that a new command has
//! been posted. A signal is a generation counter: the dispatcher advances it
//! once per command, and workers wait for it to move past the last generation
//! they saw.
//!
//! Workers either spin on the counter (the default, lowest latency) or park on
//! it with a futex. The dispatcher only makes a wake-up syscall when at least
//! one worker is actually parked.

use crate::flags::Flags;
use crate::padded::CachePadded;
use crate::platform::*;

// -----------------------------------------------------------------------------
// Wait strategy

/// How a thread waits for the next command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) enum WaitStrategy {
    /// Poll the generation counter for a bounded number of iterations, then
    /// park. This is the default.
    #[default]
    Spinning,
    /// Park on the generation counter immediately.
    Blocked,
}

impl WaitStrategy {
    /// Returns the strategy to use for the wait that follows a command
    /// dispatched with `flags`.
    #[inline(always)]
    pub fn after(flags: Flags) -> WaitStrategy {
        if flags.contains(Flags::YIELD_WORKERS) {
            WaitStrategy::Blocked
        } else {
            WaitStrategy::Spinning
        }
    }
}

// -----------------------------------------------------------------------------
// Signal

/// A broadcast signal with one sender (the dispatcher) and many receivers (the
/// workers). See the module docs.
pub struct Signal {
    /// Advanced once per posted command. Doubles as the futex word.
    generation: CachePadded<AtomicU32>,
    /// The number of receivers that are parked, or about to park.
    sleepers: CachePadded<AtomicU32>,
}

impl Signal {
    /// Creates a new signal at generation zero.
    pub fn new() -> Signal {
        Signal {
            generation: CachePadded::new(AtomicU32::new(0)),
            sleepers: CachePadded::new(AtomicU32::new(0)),
        }
    }

    /// Advances the generation and wakes every parked receiver. Returns the new
    /// generation.
    ///
    /// All writes made before this call are visible to a receiver once it
    /// observes the new generation.
    #[inline]
    pub fn post(&self) -> u32 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst).wrapping_add(1);

        // This load is ordered after the increment. A receiver registers as a
        // sleeper before it re-checks the generation, so either it sees the
        // new generation or we see it as a sleeper here.
        if self.sleepers.load(Ordering::SeqCst) != 0 {
            wake_all(&self.generation);
        }

        generation
    }

    /// Waits until the generation differs from `seen`, and returns the new
    /// generation.
    ///
    /// With [`WaitStrategy::Spinning`] this polls up to `spin_iterations` times
    /// before parking; with [`WaitStrategy::Blocked`] it parks right away.
    #[inline]
    pub fn wait(&self, seen: u32, strategy: WaitStrategy, spin_iterations: u32) -> u32 {
        if strategy == WaitStrategy::Spinning {
            for _ in 0..spin_iterations {
                let generation = self.generation.load(Ordering::Acquire);
                if generation != seen {
                    return generation;
                }
                spin_loop();
            }
        }

        self.wait_cold(seen)
    }

    #[cold]
    fn wait_cold(&self, seen: u32) -> u32 {
        loop {
            self.sleepers.fetch_add(1, Ordering::SeqCst);
            if self.generation.load(Ordering::SeqCst) == seen {
                // The futex re-checks the value atomically, so a post that
                // lands between the load and the wait is not lost.
                wait(&self.generation, seen);
            }
            self.sleepers.fetch_sub(1, Ordering::Relaxed);

            let generation = self.generation.load(Ordering::Acquire);
            if generation != seen {
                return generation;
            }
        }
    }
}

impl Default for Signal {
    fn default() -> Signal {
        Signal::new()
    }
}
