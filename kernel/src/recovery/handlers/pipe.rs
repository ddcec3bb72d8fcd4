//! C6.8: pipe handler. Resetting a pipe discards whatever was
//! buffered and closes both ends, so the syscall that was using it
//! always fails rather than redoes — there is nothing left to retry.

use crate::pipe::recover_pipe;
use crate::proc::Proc;
use crate::recovery::after_treatment::Termination;

pub fn recover(addr: usize, _p: &mut Proc<'static>) -> Termination {
    if !recover_pipe(addr) {
        return Termination::FailStop;
    }
    Termination::SyscallFail
}
