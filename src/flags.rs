//! Per-dispatch hints.

use bitflags::bitflags;

bitflags! {
    /// Optional hints accepted by every dispatch. Flags are composable.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// Flush denormal floating-point numbers to zero while the dispatch
        /// runs.
        ///
        /// The control register of every participating thread (the caller
        /// and the workers) is modified before the thread processes any unit
        /// and restored once it has finished its share. This can noticeably
        /// speed up numeric kernels, at the cost of slightly less accurate and
        /// less reproducible results across architectures.
        const DISABLE_DENORMALS = 0x0000_0001;

        /// Yield the worker threads to the system scheduler once the dispatch
        /// completes.
        ///
        /// Workers wait for the next command with a kernel wait instead of the
        /// default spin-wait. This only affects the wait that immediately
        /// follows this dispatch; pass the flag on every call to keep the
        /// workers parked between all dispatches.
        const YIELD_WORKERS = 0x0000_0002;
    }
}
