//! Shadow-Transaction Log (C4): pre-images of a handful of small
//! mutations (log header, allocator free-list head) so a UE mid-update
//! can be rolled forward or back, plus per-process nesting counters for
//! the three protected operations named in §4.4.

use crate::log::LogHeader;

/// Per-process transaction nesting counters (§3's Shadow-Transaction
/// Slot, minus the globals which live in `ShadowGlobals` below).
#[derive(Copy, Clone)]
pub struct TransCounters {
    pagetable_ntrans: i32,
    log_ntrans: i32,
    run_ntrans: i32,
}

impl TransCounters {
    pub const fn new() -> Self {
        TransCounters {
            pagetable_ntrans: 0,
            log_ntrans: 0,
            run_ntrans: 0,
        }
    }

    pub fn pagetable_active(&self) -> bool {
        self.pagetable_ntrans > 0
    }

    pub fn log_active(&self) -> bool {
        self.log_ntrans > 0
    }

    pub fn run_active(&self) -> bool {
        self.run_ntrans > 0
    }
}

pub fn enter_trans_pagetable(p: &mut crate::proc::Proc<'static>) {
    p.trans.pagetable_ntrans += 1;
}

pub fn exit_trans_pagetable(p: &mut crate::proc::Proc<'static>) {
    p.trans.pagetable_ntrans -= 1;
}

pub fn enter_trans_log(p: &mut crate::proc::Proc<'static>) {
    p.trans.log_ntrans += 1;
    snapshot_log_header();
}

pub fn exit_trans_log(p: &mut crate::proc::Proc<'static>) {
    p.trans.log_ntrans -= 1;
}

pub fn enter_trans_run(p: &mut crate::proc::Proc<'static>, node: *mut crate::kalloc::Run) {
    p.trans.run_ntrans += 1;
    unsafe {
        PENDING_FREE_RUN = Some(node);
    }
}

pub fn exit_trans_run(p: &mut crate::proc::Proc<'static>) {
    p.trans.run_ntrans -= 1;
    if p.trans.run_ntrans == 0 {
        unsafe {
            PENDING_FREE_RUN = None;
        }
    }
}

/// Shadow copy of the log header plus the outstanding op-count,
/// snapshotted whenever a log transaction opens (§4.4's "Log header +
/// outstanding op-count" row).
static mut LOG_PRE_IMAGE_HEADER: LogHeader = LogHeader::empty();
static mut LOG_PRE_IMAGE_OUTSTANDING: i32 = 0;

fn snapshot_log_header() {
    unsafe {
        LOG_PRE_IMAGE_HEADER = crate::log::snapshot_header();
        LOG_PRE_IMAGE_OUTSTANDING = crate::log::outstanding();
    }
}

pub fn log_header_pre_image() -> LogHeader {
    unsafe { LOG_PRE_IMAGE_HEADER }
}

pub fn log_outstanding_pre_image() -> i32 {
    unsafe { LOG_PRE_IMAGE_OUTSTANDING }
}

/// Pointer to the free-list node currently being spliced in/out, kept
/// so a UE mid-splice can be undone by re-inserting it.
static mut PENDING_FREE_RUN: Option<*mut crate::kalloc::Run> = None;

pub fn pending_free_run() -> Option<*mut crate::kalloc::Run> {
    unsafe { PENDING_FREE_RUN }
}

/// Check a process's shadow-transaction counters against a UE and
/// dispatch the §7 mode-table behavior for a "transaction-interrupted
/// fault". Returns `true` if the caller should treat this as a
/// transaction-interrupted fault rather than continue to the ordinary
/// class handler.
pub fn check_and_handle_pagetable(p: &mut crate::proc::Proc<'static>) -> Option<crate::recovery::after_treatment::Termination> {
    use crate::recovery::after_treatment::Termination;
    use crate::recovery::{recovery_mode, RecoveryMode};

    if !p.trans.pagetable_active() {
        return None;
    }
    Some(match recovery_mode() {
        RecoveryMode::Aggressive => Termination::ProcessKill,
        RecoveryMode::Conservative => Termination::FailStop,
    })
}

pub fn check_and_handle_log(p: &mut crate::proc::Proc<'static>) -> bool {
    p.trans.log_active()
}

pub fn check_and_handle_run(p: &mut crate::proc::Proc<'static>) -> bool {
    p.trans.run_active()
}
