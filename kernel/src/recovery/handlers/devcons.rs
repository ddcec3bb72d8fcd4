//! C6.7: console / device-switch / printer handler. These three share
//! a handler because recovering any one of them ends the same way:
//! decide whether the faulting process was in `usertrap` or
//! `kerneltrap` when the UE landed and resume accordingly, per §4.6's
//! console-family branches.

use crate::console::{console, recover_console, Console};
use crate::file::{devsw_set, Devsw, CONSOLE};
use crate::param::NDEV;
use crate::printf::printer;
use crate::proc::Proc;
use crate::recovery::after_treatment::Termination;
use crate::recovery::mlist::MClass;
use crate::recovery::stackwalk::Frame;

pub fn recover(addr: usize, class: MClass, p: &mut Proc<'static>) -> Termination {
    let ok = match class {
        MClass::Console => recover_console(addr),
        MClass::Print => printer().recover(addr),
        MClass::Devsw => {
            if addr >= NDEV {
                false
            } else {
                unsafe {
                    devsw_set(addr, console() as *mut Console as *mut dyn Devsw);
                }
                addr == CONSOLE
            }
        }
        _ => false,
    };

    if !ok {
        return Termination::FailStop;
    }

    if p.call_stack.contains(Frame::UserTrap) {
        Termination::ReturnToUser
    } else if p.call_stack.contains(Frame::KernelTrap) {
        Termination::ReturnToKernel
    } else {
        Termination::SyscallFail
    }
}
