//! After-Treatment Dispatcher (C7): given a class handler's verdict,
//! perform the control-flow effect §4.7 names and (for the codes a
//! syscall return value carries) encode it back to the integer the
//! user library negates and inspects.

use crate::proc::Proc;

/// A class handler's verdict (§4.7's table). Kept as an enum
/// internally; [`encode`] is the only place this becomes a wire value.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Termination {
    SyscallSuccess,
    SyscallFail,
    SyscallRedo,
    ReopenFail,
    ReopenRedo,
    ProcessKill,
    ReturnToUser,
    ReturnToKernel,
    FailStop,
}

/// Wire-level codes (`0x2..0xb`), retained only as the syscall-return
/// encoding the user library negates and inspects.
pub const CODE_SYSCALL_SUCCESS: i64 = 0x2;
pub const CODE_SYSCALL_FAIL: i64 = 0x3;
pub const CODE_SYSCALL_REDO: i64 = 0x4;
pub const CODE_REOPEN_FAIL: i64 = 0x5;
pub const CODE_REOPEN_REDO: i64 = 0x6;
pub const CODE_PROCESS_KILL: i64 = 0x7;
pub const CODE_RETURN_TO_USER: i64 = 0x8;
pub const CODE_RETURN_TO_KERNEL: i64 = 0x9;
pub const CODE_FAIL_STOP: i64 = 0xa;

fn encode(t: Termination) -> i64 {
    match t {
        Termination::SyscallSuccess => CODE_SYSCALL_SUCCESS,
        Termination::SyscallFail => CODE_SYSCALL_FAIL,
        Termination::SyscallRedo => CODE_SYSCALL_REDO,
        Termination::ReopenFail => CODE_REOPEN_FAIL,
        Termination::ReopenRedo => CODE_REOPEN_REDO,
        Termination::ProcessKill => CODE_PROCESS_KILL,
        Termination::ReturnToUser => CODE_RETURN_TO_USER,
        Termination::ReturnToKernel => CODE_RETURN_TO_KERNEL,
        Termination::FailStop => CODE_FAIL_STOP,
    }
}

/// Execute `t`'s control-flow effect for `p` and, when the code is one
/// a syscall return value carries, return the value `p`'s trapframe's
/// `a0` should be set to. Returns `None` when the termination diverges
/// (process kill, fail-stop) or resumes execution through a path other
/// than a syscall return (return-to-user/kernel).
pub fn dispatch(p: &mut Proc<'static>, t: Termination) -> Option<i64> {
    match t {
        Termination::SyscallSuccess => Some(encode(t)),
        Termination::SyscallFail => Some(-encode(t)),
        Termination::SyscallRedo => Some(-encode(t)),
        Termination::ReopenFail => {
            mark_all_reserved(p);
            Some(-encode(t))
        }
        Termination::ReopenRedo => {
            mark_all_reserved(p);
            Some(-encode(t))
        }
        Termination::ProcessKill => {
            p.set_killed(1);
            None
        }
        Termination::ReturnToUser => None,
        Termination::ReturnToKernel => None,
        Termination::FailStop => panic!("recovery: fail-stop"),
    }
}

fn mark_all_reserved(p: &mut Proc<'static>) {
    for fd in 0..p.ofile.len() {
        if p.ofile[fd].is_none() && p.open_args.args(fd).is_some() {
            p.open_args.mark_reserved(fd);
        }
    }
}
