//! C6.5: page-table handler. `mlist::lookup_pagetable` packs the
//! owning (pid, level) alongside the address since the same physical
//! page can legitimately be mirrored for more than one process; this
//! port only ever recovers on behalf of the currently faulting
//! process, so a mismatch (or a process with no PTDUP store yet)
//! fail-stops rather than reach across into another process's tables.

use crate::proc::Proc;
use crate::recovery::after_treatment::Termination;
use crate::recovery::mlist::lookup_pagetable;
use crate::recovery::ptdup::{recover_l0, recover_l2};
use crate::recovery::{recovery_mode, RecoveryMode};
use crate::riscv::PageTable;

/// Mirrored levels, matching `ptdup::create_l1`'s convention: 2 is the
/// root L2 page, 1 is an L1 page hanging off it, 0 is an L0 leaf page.
/// Level 1 has no handled case below: rebuilding an L1 page's own PTE
/// array would need witnesses this store doesn't keep (only the parent
/// L2 entry pointing at it, via `ptdup::recover_l1`), so it fail-stops.
const LEVEL_L2: u8 = 2;
const LEVEL_L0: u8 = 0;

pub fn recover(addr: usize, p: &mut Proc<'static>) -> Termination {
    let Some((base, pid, level)) = lookup_pagetable(addr) else {
        return Termination::FailStop;
    };
    if pid != p.pid {
        return Termination::FailStop;
    }
    let Some(root_ptr) = p.ptdup_root else {
        return Termination::FailStop;
    };

    let root = unsafe { &*root_ptr };
    let fresh = unsafe { &mut *(base as *mut PageTable) };

    let result = match level {
        LEVEL_L2 => recover_l2(root, fresh),
        LEVEL_L0 => recover_l0(root, base, fresh),
        _ => Err(crate::recovery::RecoveryError::NoMirror),
    };

    if result.is_err() {
        return Termination::FailStop;
    }

    match recovery_mode() {
        RecoveryMode::Aggressive => Termination::SyscallRedo,
        RecoveryMode::Conservative => Termination::SyscallFail,
    }
}
