//! C6.2: file-table handler. Clearing the slot already redirects every
//! live process's matching `ofile` entry (and, in cooperative mode,
//! marks it RESERVED instead) — see `file::file::recover_file_slot`.

use crate::file::file::recover_file_slot;
use crate::proc::Proc;
use crate::recovery::after_treatment::Termination;
use crate::recovery::{recovery_mode, user_coop_enabled, RecoveryMode};

pub fn recover(addr: usize, _p: &mut Proc<'static>) -> Termination {
    if recover_file_slot(addr).is_none() {
        return Termination::FailStop;
    }

    if user_coop_enabled() {
        match recovery_mode() {
            RecoveryMode::Aggressive => Termination::ReopenRedo,
            RecoveryMode::Conservative => Termination::ReopenFail,
        }
    } else {
        match recovery_mode() {
            RecoveryMode::Aggressive => Termination::SyscallRedo,
            RecoveryMode::Conservative => Termination::SyscallFail,
        }
    }
}
