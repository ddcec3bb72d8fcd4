//! C6: per-object-class recovery handlers. `tracker::dispatch` hands a
//! classified, R.C.S.-admitted fault to [`recover`], which traces
//! start/end per the external interface contract and delegates to the
//! matching submodule.

use crate::proc::Proc;
use crate::recovery::after_treatment::Termination;
use crate::recovery::logging;
use crate::recovery::mlist::MClass;

mod buf;
mod devcons;
mod file;
mod inode;
mod kmem;
mod locks;
mod log;
mod pagetable;
mod pipe;

pub fn recover(class: MClass, addr: usize, p: &mut Proc<'static>) -> Termination {
    let name = class_name(class);
    logging::trace_recovery_start(name, logging::tick());

    let t = match class {
        MClass::Buf => buf::recover(addr, p),
        MClass::File => file::recover(addr, p),
        MClass::Pipe => pipe::recover(addr, p),
        MClass::Inode => inode::recover(addr, p),
        MClass::Log | MClass::LogHeader => log::recover(addr, p),
        MClass::PageTable => pagetable::recover(addr, p),
        MClass::KMem | MClass::Run => kmem::recover(addr, class),
        MClass::Console | MClass::Devsw | MClass::Print => devcons::recover(addr, class, p),
        MClass::Sleeplock | MClass::Spinlock => locks::recover(addr, p),
    };

    logging::trace_recovery_end(name, logging::tick());
    t
}

fn class_name(class: MClass) -> &'static str {
    match class {
        MClass::Buf => "buf",
        MClass::File => "file",
        MClass::Inode => "inode",
        MClass::Log => "log",
        MClass::LogHeader => "logheader",
        MClass::Pipe => "pipe",
        MClass::Sleeplock => "sleeplock",
        MClass::Spinlock => "spinlock",
        MClass::Console => "console",
        MClass::Devsw => "devsw",
        MClass::Print => "print",
        MClass::KMem => "kmem",
        MClass::Run => "run",
        MClass::PageTable => "pagetable",
    }
}
