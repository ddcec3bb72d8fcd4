//! C6.1: buffer-cache handler. The buf array is a fixed static table,
//! so "replace the object" is "reinitialize the slot in place" — no
//! fresh allocation is needed, unlike the original's page-backed bufs.

use crate::bio::recover_buf;
use crate::proc::Proc;
use crate::recovery::after_treatment::Termination;
use crate::recovery::stackwalk::Frame;
use crate::recovery::{recovery_mode, RecoveryMode};

pub fn recover(addr: usize, p: &mut Proc<'static>) -> Termination {
    // A UE landing on a buf while the faulted process is itself inside
    // brelse() means the buf's own linkage is being rewritten right
    // now; there is no consistent slot to reinitialize it into, so this
    // case always fails stop regardless of recovery mode.
    if p.call_stack.contains(Frame::Brelse) {
        return Termination::FailStop;
    }

    if !recover_buf(addr) {
        return Termination::FailStop;
    }

    match recovery_mode() {
        RecoveryMode::Aggressive => Termination::SyscallRedo,
        RecoveryMode::Conservative => Termination::SyscallFail,
    }
}
