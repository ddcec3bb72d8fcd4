//! Error type for the recovery subsystem's internal API. Ordinary kernel
//! code kept from the teacher still returns C-style sentinels at the
//! syscall boundary; everything under `recovery::` is new and uses
//! `Result`/`Option` throughout.

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RecoveryError {
    /// The safe allocator had no page to hand out.
    OutOfMemory,
    /// No registered witness exists for the broken address.
    NotRegistered,
    /// The interrupted procedure is not on the recoverable list for the
    /// active recovery mode.
    UnrecoverableSite,
    /// PTDUP has no mirror for the level being reconstructed.
    NoMirror,
    /// Two witnesses disagree about the same slot.
    Conflict,
    /// A class already held exclusively is being entered again.
    AlreadyRecovering,
    /// The NMI queue has no room for another victim.
    QueueFull,
}

pub type RecoveryResult<T> = Result<T, RecoveryError>;
