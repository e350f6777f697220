//! Unwinding recovery utilities, adapted from rayon.

use alloc::boxed::Box;
use core::any::Any;
use core::panic::AssertUnwindSafe;
use std::eprintln;
use std::panic::catch_unwind;
use std::panic::resume_unwind;
use std::process::abort;
use std::thread::Result;

use crate::platform::*;

/// Executes `f` and captures any panic, translating that panic into a
/// `Err` result. The assumption is that any panic will be propagated
/// later with `resume_unwinding`, and hence `f` can be treated as
/// exception safe.
#[inline(always)]
pub fn halt_unwinding<F, R>(func: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    catch_unwind(AssertUnwindSafe(func))
}

#[cold]
pub fn resume_unwinding(payload: Box<dyn Any + Send>) -> ! {
    resume_unwind(payload)
}

/// Holds the first panic raised by any participant of a dispatch, so it can
/// be re-raised on the dispatching thread after the barrier.
pub struct PanicSlot {
    payload: Mutex<Option<Box<dyn Any + Send>>>,
}

impl PanicSlot {
    pub fn new() -> PanicSlot {
        PanicSlot {
            payload: Mutex::new(None),
        }
    }

    /// Records a panic payload. Later payloads are dropped.
    #[cold]
    pub fn store(&self, payload: Box<dyn Any + Send>) {
        let mut slot = match self.payload.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.is_none() {
            *slot = Some(payload);
        }
    }

    /// Takes the recorded payload, if any.
    pub fn take(&self) -> Option<Box<dyn Any + Send>> {
        match self.payload.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Default for PanicSlot {
    fn default() -> PanicSlot {
        PanicSlot::new()
    }
}

/// Aborts the program when dropped.
///
/// Used to guard the engine's own bookkeeping: if it unwinds, the dispatch
/// protocol can no longer be completed and the dispatcher would hang.
pub struct AbortOnDrop;

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        eprintln!("Tessel: detected unexpected panic; aborting");
        abort();
    }
}
