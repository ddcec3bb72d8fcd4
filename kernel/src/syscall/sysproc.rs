use crate::proc::fork;

pub(crate) fn sys_fork() -> u64 {
    match fork() {
        Some(pid) => pid as u64,
        None => u32::MAX as u64,
    }
}
