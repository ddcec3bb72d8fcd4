//! Fail-stop gate (§4.6 "Common shape" step 1): decide whether the
//! procedure a process was executing when the UE landed is one a
//! handler is allowed to recover out from under, or whether the
//! interruption must fail-stop.
//!
//! **Implementation note (resolves a Design Note).** The original walks
//! saved return addresses off the raw kernel stack and pattern-matches
//! them against known function ranges. Rust has no portable, safe way
//! to reinterpret an arbitrary stack region as return addresses; the
//! actual information the walk extracts — "is the faulted process
//! currently inside one of these named procedures" — is instead
//! maintained directly: call sites that matter to a recovery handler
//! push a `Frame` when they enter and a `FrameGuard` pops it on drop.
//! `CallStack::contains` replaces the pattern match.

use crate::recovery::config::DEPTH;

/// A site whose presence on the call stack changes how a UE is
/// recovered (§4.6's per-handler stack-trace branches).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Frame {
    UserTrap,
    KernelTrap,
    SysRead,
    SysWrite,
    SysOpen,
    SysClose,
    LogCommit,
    LogInstallTrans,
    ConsoleWrite,
    Printf,
    ClockIntr,
    Brelse,
    Freeproc,
    Exit,
    Procinit,
    Kvminit,
    Uvmunmap,
}

/// Fixed-depth per-process record of the named sites currently entered,
/// most-recent last. `DEPTH` bounds nesting the same way the original's
/// stack-walk bounds how many frames it is willing to inspect.
#[derive(Copy, Clone)]
pub struct CallStack {
    frames: [Option<Frame>; DEPTH],
    len: usize,
}

impl CallStack {
    pub const fn new() -> Self {
        CallStack {
            frames: [None; DEPTH],
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.frames = [None; DEPTH];
        self.len = 0;
    }

    pub(crate) fn push(&mut self, f: Frame) {
        if self.len >= DEPTH {
            // Deeper nesting than the fail-stop gate is prepared to
            // track; treat it the same as an unrecognized frame rather
            // than panicking the whole kernel over bookkeeping.
            return;
        }
        self.frames[self.len] = Some(f);
        self.len += 1;
    }

    fn pop(&mut self, f: Frame) {
        for i in (0..self.len).rev() {
            if self.frames[i] == Some(f) {
                for j in i..self.len - 1 {
                    self.frames[j] = self.frames[j + 1];
                }
                self.len -= 1;
                self.frames[self.len] = None;
                return;
            }
        }
    }

    pub fn contains(&self, f: Frame) -> bool {
        self.frames[..self.len].iter().any(|e| *e == Some(f))
    }

    pub fn top(&self) -> Option<Frame> {
        if self.len == 0 {
            None
        } else {
            self.frames[self.len - 1]
        }
    }
}

/// RAII marker: push `frame` onto the current process's call stack on
/// construction, pop it on drop. Call sites wrap the body of the named
/// procedure in `let _g = FrameGuard::enter(Frame::SysWrite);`.
///
/// A few wrapped procedures (`kvminit`, `procinit`) run during early
/// boot before any process has been scheduled; `enter` tolerates that
/// by becoming an inert guard rather than panicking on `myproc()`.
pub struct FrameGuard {
    frame: Frame,
    proc: *mut crate::proc::Proc<'static>,
}

impl FrameGuard {
    pub fn enter(frame: Frame) -> Self {
        let proc = match crate::proc::current_proc() {
            Some(p) => {
                p.call_stack.push(frame);
                p as *mut _
            }
            None => core::ptr::null_mut(),
        };
        FrameGuard { frame, proc }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.proc.is_null() {
            unsafe {
                (*self.proc).call_stack.pop(self.frame);
            }
        }
    }
}
