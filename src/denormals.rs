//! Scoped control of denormal floating-point handling.
//!
//! Processing denormal numbers is usually done in microcode and is very slow.
//! The guard in this module switches the calling thread's floating-point unit
//! into flush-to-zero mode and restores the previous mode when dropped, even
//! if the thread is unwinding.
//!
//! On x86 this sets the FTZ and DAZ bits of `MXCSR`. On aarch64 it sets the FZ
//! and FZ16 bits of `FPCR`. Elsewhere the guard does nothing.

use core::marker::PhantomData;

// -----------------------------------------------------------------------------
// Guard

/// Disables denormals on the current thread for as long as it is alive.
///
/// The floating-point control register is per-thread, so the guard is neither
/// `Send` nor `Sync`.
#[must_use = "denormals are restored as soon as the guard is dropped"]
pub struct DenormalGuard {
    saved: arch::State,
    _thread_bound: PhantomData<*const ()>,
}

impl DenormalGuard {
    /// True if denormal control is implemented for the target architecture.
    pub const SUPPORTED: bool = arch::SUPPORTED;

    /// Saves the current floating-point mode and disables denormals.
    #[inline]
    pub fn new() -> DenormalGuard {
        let saved = arch::save();
        arch::flush_to_zero(saved);
        DenormalGuard {
            saved,
            _thread_bound: PhantomData,
        }
    }

    /// Returns true if the current thread flushes denormal results to zero.
    ///
    /// This performs an arithmetic probe rather than reading the control
    /// register, so it reflects what kernels will actually observe.
    #[inline(never)]
    pub fn is_flushing() -> bool {
        let tiny = core::hint::black_box(f32::MIN_POSITIVE);
        let half = core::hint::black_box(0.5_f32);
        core::hint::black_box(tiny * half) == 0.0
    }
}

impl Default for DenormalGuard {
    fn default() -> DenormalGuard {
        DenormalGuard::new()
    }
}

impl Drop for DenormalGuard {
    #[inline]
    fn drop(&mut self) {
        arch::restore(self.saved);
    }
}

// -----------------------------------------------------------------------------
// x86

#[cfg(any(target_arch = "x86_64", all(target_arch = "x86", target_feature = "sse")))]
mod arch {
    use core::arch::asm;

    pub const SUPPORTED: bool = true;

    /// Flush-to-zero (bit 15) and denormals-are-zero (bit 6).
    const FTZ_DAZ: u32 = 0x8040;

    pub type State = u32;

    #[inline(always)]
    pub fn save() -> u32 {
        let mut mxcsr: u32 = 0;
        // SAFETY: `stmxcsr` only stores the control register into the
        // provided location, which is a live local.
        unsafe {
            asm!(
                "stmxcsr [{ptr}]",
                ptr = in(reg) &raw mut mxcsr,
                options(nostack, preserves_flags),
            );
        }
        mxcsr
    }

    #[inline(always)]
    pub fn restore(mxcsr: u32) {
        // SAFETY: The value was produced by `save` (possibly with the FTZ and
        // DAZ bits set), so every reserved bit keeps its original value.
        unsafe {
            asm!(
                "ldmxcsr [{ptr}]",
                ptr = in(reg) &raw const mxcsr,
                options(nostack, preserves_flags, readonly),
            );
        }
    }

    #[inline(always)]
    pub fn flush_to_zero(saved: u32) {
        restore(saved | FTZ_DAZ);
    }
}

// -----------------------------------------------------------------------------
// aarch64

#[cfg(target_arch = "aarch64")]
mod arch {
    use core::arch::asm;

    pub const SUPPORTED: bool = true;

    /// Flush-to-zero (bit 24) and half-precision flush-to-zero (bit 19).
    const FZ_FZ16: u64 = 0x0108_0000;

    pub type State = u64;

    #[inline(always)]
    pub fn save() -> u64 {
        let fpcr: u64;
        // SAFETY: Reading FPCR has no side effects.
        unsafe {
            asm!(
                "mrs {fpcr}, fpcr",
                fpcr = out(reg) fpcr,
                options(nomem, nostack, preserves_flags)
            );
        }
        fpcr
    }

    #[inline(always)]
    pub fn restore(fpcr: u64) {
        // SAFETY: The value was produced by `save` (possibly with the FZ bits
        // set), so every reserved bit keeps its original value.
        unsafe {
            asm!("msr fpcr, {fpcr}", fpcr = in(reg) fpcr, options(nomem, nostack, preserves_flags));
        }
    }

    #[inline(always)]
    pub fn flush_to_zero(saved: u64) {
        restore(saved | FZ_FZ16);
    }
}

// -----------------------------------------------------------------------------
// Everything else

#[cfg(not(any(
    target_arch = "x86_64",
    all(target_arch = "x86", target_feature = "sse"),
    target_arch = "aarch64",
)))]
mod arch {
    pub const SUPPORTED: bool = false;

    pub type State = ();

    #[inline(always)]
    pub fn save() {}

    #[inline(always)]
    pub fn restore(_: ()) {}

    #[inline(always)]
    pub fn flush_to_zero(_: ()) {}
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(all(test, not(miri)))]
mod tests {
    use super::*;

    #[test]
    fn guard_flushes_and_restores() {
        if !DenormalGuard::SUPPORTED {
            return;
        }
        assert!(!DenormalGuard::is_flushing());
        {
            let _guard = DenormalGuard::new();
            assert!(DenormalGuard::is_flushing());
        }
        assert!(!DenormalGuard::is_flushing());
    }

    #[test]
    fn nested_guards_restore_in_order() {
        if !DenormalGuard::SUPPORTED {
            return;
        }
        let outer = DenormalGuard::new();
        {
            let _inner = DenormalGuard::new();
            assert!(DenormalGuard::is_flushing());
        }
        assert!(DenormalGuard::is_flushing());
        drop(outer);
        assert!(!DenormalGuard::is_flushing());
    }

    #[test]
    fn restored_on_unwind() {
        if !DenormalGuard::SUPPORTED {
            return;
        }
        let result = std::panic::catch_unwind(|| {
            let _guard = DenormalGuard::new();
            panic!("task failed");
        });
        assert!(result.is_err());
        assert!(!DenormalGuard::is_flushing());
    }
}
