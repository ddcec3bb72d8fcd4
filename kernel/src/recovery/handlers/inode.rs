//! C6.3: inode-cache handler. Recovering the root inode itself would
//! leave every relative path lookup with nowhere to start, so that one
//! case fail-stops instead of silently clearing the slot.

use crate::fs::fs::recover_inode;
use crate::param::ROOTDEV;
use crate::fs::ROOTINO;
use crate::proc::Proc;
use crate::recovery::after_treatment::Termination;
use crate::recovery::{recovery_mode, RecoveryMode};

pub fn recover(addr: usize, _p: &mut Proc<'static>) -> Termination {
    let Some((dev, inum)) = recover_inode(addr) else {
        return Termination::FailStop;
    };

    if dev == ROOTDEV && inum == ROOTINO {
        return Termination::FailStop;
    }

    match recovery_mode() {
        RecoveryMode::Aggressive => Termination::SyscallRedo,
        RecoveryMode::Conservative => Termination::SyscallFail,
    }
}
