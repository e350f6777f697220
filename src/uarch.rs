//! Microarchitecture-aware dispatch.
//!
//! Some kernels ship several code paths tuned for different CPU
//! implementations (for example the big and little cores of a heterogeneous
//! ARM system). The pool does not know anything about CPUs itself; it asks an
//! injected [`UarchDetector`] for the index of the core a participant is
//! running on, clamps the answer against the bounds supplied by the caller,
//! and passes the result to the task as an opaque tag.
//!
//! # Detector lifecycle
//!
//! Every pool holds a detector. Unless one is set on the builder, the pool
//! uses the process-wide detector returned by [`uarch_detector`]. The
//! process-wide detector is initialised lazily, on first use, to
//! [`Homogeneous`]. It can be replaced exactly once, before first use, with
//! [`install_uarch_detector`].

use alloc::sync::Arc;
use std::sync::OnceLock;

use tracing::debug;

// -----------------------------------------------------------------------------
// Detection

/// A CPU identification service.
pub trait UarchDetector: Send + Sync {
    /// Returns the microarchitecture index of the core the calling thread is
    /// currently running on, or `None` if it cannot be determined.
    fn current_uarch_index(&self) -> Option<u32>;
}

/// Reports every core as microarchitecture zero. This matches what CPU
/// identification libraries report on systems built from a single core type.
#[derive(Clone, Copy, Debug, Default)]
pub struct Homogeneous;

impl UarchDetector for Homogeneous {
    #[inline]
    fn current_uarch_index(&self) -> Option<u32> {
        Some(0)
    }
}

/// Never identifies the core, forcing every dispatch onto its default index.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDetection;

impl UarchDetector for NoDetection {
    #[inline]
    fn current_uarch_index(&self) -> Option<u32> {
        None
    }
}

impl<F> UarchDetector for F
where
    F: Fn() -> Option<u32> + Send + Sync,
{
    #[inline]
    fn current_uarch_index(&self) -> Option<u32> {
        self()
    }
}

/// A detector shared between pools. This is always the standard `Arc`, even
/// when the pool's own primitives are mocked.
pub(crate) type SharedDetector = Arc<dyn UarchDetector>;

static DETECTOR: OnceLock<SharedDetector> = OnceLock::new();

/// Returns the process-wide detector, initialising it to [`Homogeneous`] if
/// nothing has been installed.
pub fn uarch_detector() -> Arc<dyn UarchDetector> {
    DETECTOR
        .get_or_init(|| {
            debug!("initializing default microarchitecture detector");
            Arc::new(Homogeneous)
        })
        .clone()
}

/// Installs the process-wide detector. This succeeds only if no detector has
/// been installed or used yet; otherwise the rejected detector is returned.
pub fn install_uarch_detector(
    detector: Arc<dyn UarchDetector>,
) -> Result<(), Arc<dyn UarchDetector>> {
    let result = DETECTOR.set(detector);
    match result {
        Ok(()) => debug!("installed microarchitecture detector"),
        Err(_) => debug!("microarchitecture detector already initialized"),
    }
    result
}

// -----------------------------------------------------------------------------
// Resolution

/// The bounds supplied with a microarchitecture-aware dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UarchBounds {
    /// Used when the core cannot be identified, or when its index exceeds
    /// `max`. This is deliberately not bounded by `max`: an out-of-range
    /// default is a valid way to request a generic code path.
    pub default: u32,
    /// The largest index the task knows how to handle.
    pub max: u32,
}

impl UarchBounds {
    /// Creates a new set of bounds.
    #[inline]
    pub const fn new(default: u32, max: u32) -> UarchBounds {
        UarchBounds { default, max }
    }

    /// Resolves the index for the calling thread.
    #[inline]
    pub fn resolve(&self, detector: &dyn UarchDetector) -> u32 {
        match detector.current_uarch_index() {
            Some(index) if index <= self.max => index,
            _ => self.default,
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detected_index_within_bounds() {
        let bounds = UarchBounds::new(7, 3);
        assert_eq!(bounds.resolve(&|| Some(2)), 2);
        assert_eq!(bounds.resolve(&|| Some(3)), 3);
    }

    #[test]
    fn out_of_range_index_falls_back() {
        let bounds = UarchBounds::new(1, 3);
        assert_eq!(bounds.resolve(&|| Some(4)), 1);
    }

    #[test]
    fn unknown_core_falls_back() {
        let bounds = UarchBounds::new(2, 3);
        assert_eq!(bounds.resolve(&NoDetection), 2);
    }

    #[test]
    fn default_may_exceed_max() {
        let bounds = UarchBounds::new(u32::MAX, 0);
        assert_eq!(bounds.resolve(&NoDetection), u32::MAX);
        assert_eq!(bounds.resolve(&Homogeneous), 0);
    }
}
