//! This module defines the [`Command`] posted to workers for each dispatch.
//!
//! A command is effectively a trait object: a pointer to a [`Dispatch`]
//! allocated on the dispatching thread's stack, and a function that knows how
//! to run one participant's share of it. Commands are never sent between
//! threads by value; workers only ever observe a shared reference to the
//! dispatcher's command while the dispatch is in flight.
//!
//! When using a command, one must be extremely careful to ensure that:
//! (a) The dispatch outlives every worker's use of the command.
//! (b) Every worker has finished with the command before the dispatcher
//!     returns, including when the task panics.

use core::ptr::NonNull;

use crate::denormals::DenormalGuard;
use crate::flags::Flags;
use crate::partition::Grid;
use crate::partition::Unit;
use crate::uarch::UarchBounds;
use crate::uarch::UarchDetector;
use crate::unwind;
use crate::unwind::PanicSlot;

// -----------------------------------------------------------------------------
// Participants

/// Identifies a thread taking part in a dispatch.
pub struct Participant<'a> {
    /// Index of this participant. The dispatching thread is always zero.
    pub index: usize,
    /// Total number of participants.
    pub count: usize,
    /// Used to resolve microarchitecture indices.
    pub detector: &'a dyn UarchDetector,
}

// -----------------------------------------------------------------------------
// Type-erased command

/// A type-erased reference to a [`Dispatch`], plus the flags it was posted
/// with. This is what the pool publishes to its workers.
pub struct Command {
    /// Points to a `Dispatch` on the dispatching thread's stack.
    dispatch: NonNull<()>,
    /// Runs one participant's share of the dispatch at `dispatch`.
    execute_fn: unsafe fn(NonNull<()>, &Participant<'_>),
    /// The flags the dispatch was posted with.
    flags: Flags,
}

impl Command {
    /// Returns the flags this command was posted with.
    #[inline(always)]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Runs the share of the dispatch assigned to `participant`.
    ///
    /// If requested, denormals are disabled on the current thread for the
    /// duration. A panic raised by the task is caught and recorded in
    /// `panics`; this function itself never unwinds.
    #[inline]
    pub fn execute(&self, participant: &Participant<'_>, panics: &PanicSlot) {
        let _denormals = self
            .flags
            .contains(Flags::DISABLE_DENORMALS)
            .then(DenormalGuard::new);

        // SAFETY: The creator of the command ensures the dispatch stays valid
        // until every participant has returned from this call.
        let result = unwind::halt_unwinding(|| unsafe {
            (self.execute_fn)(self.dispatch, participant);
        });

        if let Err(payload) = result {
            panics.store(payload);
        }
    }
}

// SAFETY: A command only hands out shared access to a `Dispatch`, whose task
// is required to be `Sync`, and whose other fields are plain data.
unsafe impl Sync for Command {}

// -----------------------------------------------------------------------------
// Dispatch

/// One N-dimensional iteration request, borrowed from the caller for the
/// duration of a dispatch.
pub struct Dispatch<'f, const N: usize, F> {
    grid: Grid<N>,
    uarch: Option<UarchBounds>,
    task: &'f F,
}

impl<'f, const N: usize, F> Dispatch<'f, N, F>
where
    F: Fn(Unit<N>) + Sync,
{
    /// Creates a new dispatch.
    #[inline(always)]
    pub fn new(grid: Grid<N>, uarch: Option<UarchBounds>, task: &'f F) -> Dispatch<'f, N, F> {
        Dispatch { grid, uarch, task }
    }

    /// Runs every unit assigned to `participant`, in order.
    #[inline]
    pub fn run(&self, participant: &Participant<'_>) {
        let units = self.grid.split(participant.count, participant.index);
        if units.len() == 0 {
            return;
        }

        // Resolve the microarchitecture once, up front.
        let uarch = match self.uarch {
            Some(bounds) => bounds.resolve(participant.detector),
            None => 0,
        };

        for tile in units {
            (self.task)(Unit::new(tile, participant.index, uarch));
        }
    }

    /// Creates a `Command` pointing to this dispatch.
    ///
    /// # Safety
    ///
    /// The caller must ensure the dispatch outlives every use of the returned
    /// command: no participant may still be inside [`Command::execute`] when
    /// the dispatch is dropped or moved.
    #[inline(always)]
    pub unsafe fn as_command(&self, flags: Flags) -> Command {
        Command {
            dispatch: NonNull::from(self).cast(),
            execute_fn: Self::execute,
            flags,
        }
    }

    /// Executes a `Dispatch` from a type-erased pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `this` points to a live `Dispatch<N, F>`.
    #[inline(always)]
    unsafe fn execute(this: NonNull<()>, participant: &Participant<'_>) {
        // SAFETY: The caller ensures `this` points to a live dispatch of this
        // exact type, and dispatches are only ever accessed immutably.
        let this = unsafe { this.cast::<Self>().as_ref() };
        this.run(participant);
    }
}
