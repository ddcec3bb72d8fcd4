//! C6.10: generic raw-lock handler, reusable for any standalone
//! spinlock/sleeplock registered directly (as opposed to one embedded
//! in a buf/inode/file that already gets reinitialized as part of
//! recovering the owning object). Re-initializing a lock in place
//! always just means "mark it free"; nothing else about the held-ness
//! of a lock can be reconstructed once its owner is gone.

use crate::proc::Proc;
use crate::recovery::after_treatment::Termination;
use crate::recovery::stackwalk::Frame;
use crate::spinlock::Spinlock;

pub fn recover(addr: usize, p: &mut Proc<'static>) -> Termination {
    unsafe {
        let lk = &mut *(addr as *mut Spinlock);
        let name = lk.name();
        lk.reinit(name);
    }

    // §4.6.9: a lock fault taken while servicing a user-mode trap (the
    // only trap context this port's `syscall()` dispatcher runs under)
    // resumes the user program rather than falling back into whatever
    // kernel-internal call was holding the lock.
    if p.call_stack.contains(Frame::UserTrap) {
        Termination::ReturnToUser
    } else {
        Termination::ReturnToKernel
    }
}
