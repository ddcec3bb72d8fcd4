use crate::kalloc::KMEM;
use crate::proc::wakeup;
use crate::recovery::mlist::{self, MClass};
use crate::spinlock::Spinlock;

const PIPESIZE: usize = 512;
pub struct Pipe {
    lock: Spinlock,
    data: [u8; PIPESIZE],
    nread: u32, // number of bytes read
    nwrite: u32, // number of bytes written
    readopen: bool, // read fd is still open
    writeopen: bool, // write fd is still open
}

impl Pipe {
    pub(crate) fn close(self: &mut Self, writable: bool) {
        self.lock.acquire();
        if writable {
            self.writeopen = false;
            wakeup(&self.nread);
        } else {
            self.readopen = false;
            wakeup(&self.nwrite);
        }
        if !self.readopen && !self.writeopen {
            self.lock.release();
            unsafe { KMEM.kfree(self as *mut Pipe); }
        } else {
            self.lock.release();
        }
    }

    /// Recovery-handler entry point (C6.8): reset a pipe in place,
    /// dropping whatever was buffered and closing both ends so any
    /// blocked reader/writer wakes up to an end-of-stream rather than
    /// spinning on a lock that will never unblock it.
    pub(crate) fn recover(&mut self) {
        self.lock.reinit("pipe");
        self.data = [0; PIPESIZE];
        self.nread = 0;
        self.nwrite = 0;
        self.readopen = false;
        self.writeopen = false;
        wakeup(&self.nread);
        wakeup(&self.nwrite);
    }
}

pub(crate) fn register(p: *mut Pipe) -> crate::recovery::error::RecoveryResult<()> {
    mlist::register(p as usize, MClass::Pipe)
}

/// Recovery-handler entry point (C6.8): find and reset the pipe at
/// `addr`. Unlike buf/inode/file, pipes have no fixed backing table —
/// `recover_pipe` can only act if the pipe is still registered, which
/// requires callers to have registered it via [`register`] at
/// allocation time.
pub(crate) fn recover_pipe(addr: usize) -> bool {
    if mlist::lookup(addr, MClass::Pipe).is_none() {
        return false;
    }
    unsafe {
        (*(addr as *mut Pipe)).recover();
    }
    mlist::deregister(addr, MClass::Pipe, 0);
    true
}