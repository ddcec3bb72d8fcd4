//! C6.6: physical-memory allocator handler. A UE hitting the `KMem`
//! struct or a `Run` free-list node outside an active splice (the
//! splice itself is recovered by `trans::check_and_handle_run` before
//! the tracker ever classifies the address) is recovered by rebuilding
//! the free list from the `Run` class's registry: `kalloc`/`kfree` keep
//! every currently-free page registered as a witness, so the only page
//! ever missing from the rebuilt list is the broken one itself.

use crate::kalloc::KMEM;
use crate::recovery::after_treatment::Termination;
use crate::recovery::mlist::MClass;
use crate::recovery::{recovery_mode, RecoveryMode};

pub fn recover(addr: usize, _class: MClass) -> Termination {
    unsafe {
        KMEM.recover_kmem(addr);
    }

    match recovery_mode() {
        RecoveryMode::Aggressive => Termination::SyscallRedo,
        RecoveryMode::Conservative => Termination::SyscallFail,
    }
}
