// Recovery-subsystem syscalls (C8's user-facing surface): toggling the
// recovery mode and user-cooperation protocol, inspecting which
// descriptors a process holds are RESERVED, and resurrecting one by
// re-running the open it was created with.

use crate::file::file::{fileclose, filedup};
use crate::file::File;
use crate::param::NOFILE;
use crate::proc::myproc;
use crate::recovery::{set_recovery_mode, set_user_coop, RecoveryMode};
use crate::syscall::syscall::argint;
use crate::syscall::sysfile::open_path;

pub fn sys_change_recovery_mode() -> u64 {
    let mode = match argint(0) {
        0 => RecoveryMode::Conservative,
        _ => RecoveryMode::Aggressive,
    };
    set_recovery_mode(mode);
    0
}

pub fn sys_enable_user_coop() -> u64 {
    set_user_coop(true);
    0
}

pub fn sys_disable_user_coop() -> u64 {
    set_user_coop(false);
    0
}

pub fn sys_check_reserved_fd() -> u64 {
    let fd = argint(0);
    if fd < 0 || fd as usize >= NOFILE {
        return u64::MAX;
    }
    myproc().open_args.is_reserved(fd as usize) as u64
}

pub fn sys_check_reserved_fd_all() -> u64 {
    myproc().open_args.any_reserved() as u64
}

/// Return the first RESERVED descriptor, or `u64::MAX` if none is
/// outstanding. Lets a cooperating process ask "what do I need to
/// reopen?" without scanning its own descriptor table itself.
pub fn sys_pick_fd() -> u64 {
    let p = myproc();
    for fd in 0..NOFILE {
        if p.open_args.is_reserved(fd) {
            return fd as u64;
        }
    }
    u64::MAX
}

/// Resurrect a RESERVED descriptor by re-running the open it was
/// created with. If another live descriptor already named the same
/// path, dup that file object instead of opening the path a second
/// time.
pub fn sys_reopen() -> u64 {
    let fd = argint(0);
    if fd < 0 || fd as usize >= NOFILE {
        return u64::MAX;
    }
    let fd = fd as usize;

    let p = myproc();
    if !p.open_args.is_reserved(fd) {
        return u64::MAX;
    }

    if let Some(twin) = p.open_args.find_same_path(fd) {
        if let Some(f) = p.ofile[twin] {
            filedup(f);
            p.ofile[fd] = Some(f);
            p.open_args.mark_reserved_done(fd);
            return fd as u64;
        }
    }

    let Some((path, mode)) = p.open_args.args(fd) else {
        return u64::MAX;
    };
    let mut path_buf = [0u8; crate::param::MAXPATH];
    let n = path.len().min(path_buf.len());
    path_buf[..n].copy_from_slice(&path[..n]);

    match open_path(&path_buf[..n], mode) {
        Some(f) => {
            let p = myproc();
            if let Some(old) = p.ofile[fd] {
                fileclose(unsafe { &mut *old });
            }
            p.ofile[fd] = Some(f as *mut File);
            p.open_args.mark_reserved_done(fd);
            fd as u64
        }
        None => u64::MAX,
    }
}
