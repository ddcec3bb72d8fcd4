//! Dispatch a broken address to its class handler (C1's consumer):
//! classify the fault, run the §7 fail-stop gate and mode table,
//! acquire the class's recovery lock, hand off to the matching C6
//! handler, and unwind.

use crate::proc::myproc;
use crate::recovery::after_treatment::Termination;
use crate::recovery::handlers;
use crate::recovery::mlist::{self, MClass};
use crate::recovery::rcs;
use crate::recovery::stackwalk::Frame;
use crate::recovery::trans;
use crate::recovery::{recovery_mode, RecoveryMode};

/// Every registry class, in the order `mlist::lookup` is tried.
const ALL_CLASSES: [MClass; mlist::NUM_CLASSES] = [
    MClass::Buf,
    MClass::File,
    MClass::Inode,
    MClass::Log,
    MClass::LogHeader,
    MClass::Pipe,
    MClass::Sleeplock,
    MClass::Spinlock,
    MClass::Console,
    MClass::Devsw,
    MClass::Print,
    MClass::KMem,
    MClass::Run,
    MClass::PageTable,
];

fn classify(addr: usize) -> Option<MClass> {
    for &c in ALL_CLASSES.iter() {
        if c == MClass::PageTable {
            if mlist::lookup_pagetable(addr).is_some() {
                return Some(c);
            }
        } else if mlist::lookup(addr, c).is_some() {
            return Some(c);
        }
    }
    None
}

/// §7's mode table, approximated over the call sites this port
/// instruments with a [`Frame`] (see `stackwalk`'s implementation
/// note): unrecoverable sites fail-stop in both modes regardless of
/// class; everything else falls through to the class handler.
fn gate(p: &crate::proc::Proc<'static>) -> Option<Termination> {
    if p.call_stack.contains(Frame::LogCommit) || p.call_stack.contains(Frame::LogInstallTrans) {
        return Some(Termination::FailStop);
    }
    None
}

/// Run the full tracker pipeline for one faulted address and return
/// the termination to apply. Never panics for an ordinary recoverable
/// fault; fail-stop faults panic from inside the class handler or the
/// gate above, matching §7's "FAIL_STOP: panic".
pub fn dispatch(addr: usize) -> Termination {
    let p = myproc();

    if let Some(t) = trans::check_and_handle_pagetable(p) {
        return t;
    }
    if trans::check_and_handle_log(p) || trans::check_and_handle_run(p) {
        return match recovery_mode() {
            RecoveryMode::Aggressive => Termination::SyscallRedo,
            RecoveryMode::Conservative => Termination::SyscallRedo,
        };
    }

    if let Some(t) = gate(p) {
        return t;
    }

    let Some(class) = classify(addr) else {
        return Termination::FailStop;
    };

    if rcs::participant_count(class) >= 2 {
        return Termination::FailStop;
    }

    if !rcs::enter_exclusive(class) {
        return Termination::FailStop;
    }
    p.rcs_history.push(class);

    let result = handlers::recover(class, addr, p);

    p.rcs_history.exit_one(class);
    rcs::exit_exclusive(class);

    result
}
