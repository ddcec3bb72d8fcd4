//! C6.4: log handler. Only runs once `tracker::dispatch` has already
//! ruled out an in-progress shadow transaction for the faulting
//! process (see `trans::check_and_handle_log`), so the rebuild here is
//! always against an otherwise-quiescent log.

use crate::fs::fs::sb_snapshot;
use crate::log::recover_log;
use crate::param::ROOTDEV;
use crate::proc::Proc;
use crate::recovery::after_treatment::Termination;
use crate::recovery::{recovery_mode, RecoveryMode};

pub fn recover(_addr: usize, p: &mut Proc<'static>) -> Termination {
    recover_log(ROOTDEV, &sb_snapshot(), p.pid);

    match recovery_mode() {
        RecoveryMode::Aggressive => Termination::SyscallRedo,
        RecoveryMode::Conservative => Termination::SyscallFail,
    }
}
