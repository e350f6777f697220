//! A countdown latch, used as the completion barrier of a dispatch.

use crate::padded::CachePadded;
use crate::platform::*;

// -----------------------------------------------------------------------------
// Latch

/// A [`CountLatch`] is a signaling mechanism used to indicate when a fixed
/// number of events have occurred. The latch is armed with a count, any thread
/// may count it down, and a single *owner thread* waits for it to reach zero.
///
/// Counting down has release semantics and a completed wait has acquire
/// semantics, so everything a thread did before counting down is visible to
/// the owner once `wait` returns.
pub struct CountLatch {
    /// The number of events still outstanding. Doubles as the futex word.
    remaining: CachePadded<AtomicU32>,
    /// Set while the owner is parked (or about to park) on `remaining`.
    parked: CachePadded<AtomicBool>,
}

impl CountLatch {
    /// Creates a new latch with a count of zero.
    pub fn new() -> CountLatch {
        CountLatch {
            remaining: CachePadded::new(AtomicU32::new(0)),
            parked: CachePadded::new(AtomicBool::new(false)),
        }
    }

    /// Arms the latch with a new count.
    ///
    /// This must not race with `count_down`; the owner arms the latch before
    /// publishing whatever will eventually count it down.
    #[inline(always)]
    pub fn arm(&self, count: u32) {
        self.remaining.store(count, Ordering::Relaxed);
    }

    /// Returns true if the count has reached zero.
    #[inline(always)]
    pub fn check(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }

    /// Records one event, waking the owner if this was the last one.
    #[inline]
    pub fn count_down(&self) {
        let remaining = self.remaining.fetch_sub(1, Ordering::SeqCst);
        debug_assert_ne!(remaining, 0, "latch counted down past zero");

        // The owner sets `parked` before it re-checks the count, so either it
        // sees zero or we see it parked.
        if remaining == 1 && self.parked.load(Ordering::SeqCst) {
            wake_one(&self.remaining);
        }
    }

    /// Waits for the count to reach zero, spinning up to `spin_iterations`
    /// times before parking.
    #[inline]
    pub fn wait(&self, spin_iterations: u32) {
        for _ in 0..spin_iterations {
            if self.check() {
                return;
            }
            spin_loop();
        }

        self.wait_cold();
    }

    #[cold]
    fn wait_cold(&self) {
        loop {
            self.parked.store(true, Ordering::SeqCst);
            let remaining = self.remaining.load(Ordering::SeqCst);
            if remaining == 0 {
                break;
            }
            wait(&self.remaining, remaining);
        }
        self.parked.store(false, Ordering::Relaxed);
    }
}

impl Default for CountLatch {
    fn default() -> CountLatch {
        CountLatch::new()
    }
}
