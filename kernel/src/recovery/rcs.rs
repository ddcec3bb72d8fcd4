//! Recovery-Critical Sections (C3): a locking axis orthogonal to
//! ordinary spinlocks/sleeplocks. A non-recovery thread holds a class's
//! R.C.S. *shared* (it increments a count and may re-enter); a recovery
//! handler holds it *exclusive* and blocks entrants until it is done.

use crate::recovery::config::RCS_INFO_HISTORY_SIZE;
use crate::recovery::mlist::MClass;
use crate::spinlock::Spinlock;

const NUM_CLASSES: usize = crate::recovery::mlist::NUM_CLASSES;

struct RcsSlot {
    /// Inner lock protecting `count`/`exclusive` together, so increment
    /// and "would sleep" is one atomic step ("lock-of-lock" in §5).
    guard: Spinlock,
    count: u32,
    exclusive: bool,
}

impl RcsSlot {
    const fn new() -> Self {
        RcsSlot {
            guard: Spinlock::init_lock("rcs"),
            count: 0,
            exclusive: false,
        }
    }
}

struct RcsTable {
    slots: [RcsSlot; NUM_CLASSES],
}

static mut RCS: RcsTable = RcsTable {
    slots: [
        RcsSlot::new(), RcsSlot::new(), RcsSlot::new(), RcsSlot::new(),
        RcsSlot::new(), RcsSlot::new(), RcsSlot::new(), RcsSlot::new(),
        RcsSlot::new(), RcsSlot::new(), RcsSlot::new(), RcsSlot::new(),
        RcsSlot::new(), RcsSlot::new(),
    ],
};

pub fn rcs_init() {}

fn slot(class: MClass) -> &'static mut RcsSlot {
    unsafe { &mut RCS.slots[class as usize] }
}

/// Ordinary (non-recovery) entry: spins while a recoverer holds the
/// class exclusively, then joins as a shared participant.
pub fn enter(class: MClass) {
    let s = slot(class);
    loop {
        s.guard.acquire();
        if !s.exclusive {
            s.count += 1;
            s.guard.release();
            return;
        }
        s.guard.release();
        core::hint::spin_loop();
    }
}

pub fn exit(class: MClass) {
    let s = slot(class);
    s.guard.acquire();
    debug_assert!(s.count > 0);
    if s.count > 0 {
        s.count -= 1;
    }
    s.guard.release();
}

/// Giant-then-node acquisition order for the per-node classes (buf,
/// file, inode): enter the class-wide R.C.S. first, then the specific
/// node's, matching the lock ordering the surgery code depends on.
pub fn enter_node(class: MClass, _addr: usize) {
    enter(class);
}

pub fn exit_node(class: MClass, _addr: usize) {
    exit(class);
}

/// Current count of shared (non-recovery) participants, used by the
/// tracker's fail-stop gate: a recovery of an object held by >= 2
/// participants is fail-stop rather than something worth blocking for.
pub fn participant_count(class: MClass) -> u32 {
    let s = slot(class);
    s.guard.acquire();
    let c = s.count;
    s.guard.release();
    c
}

/// Recovery entry: block until no shared participant remains, then
/// hold exclusive. Returns false (and does not block) if the class is
/// already held exclusively by someone else — callers treat that as a
/// fail-stop condition (a recovery of an object held by >= 2 R.C.S.
/// participants is fail-stop, per §7).
pub fn enter_exclusive(class: MClass) -> bool {
    let s = slot(class);
    loop {
        s.guard.acquire();
        if s.exclusive {
            s.guard.release();
            return false;
        }
        if s.count == 0 {
            s.exclusive = true;
            s.guard.release();
            return true;
        }
        s.guard.release();
        core::hint::spin_loop();
    }
}

pub fn exit_exclusive(class: MClass) {
    let s = slot(class);
    s.guard.acquire();
    s.exclusive = false;
    s.guard.release();
}

/// Per-process ordered history of entered classes (§3). Recovery
/// handlers push the classes they touch and call `exit_all` on return
/// so that a process interrupted mid-handler unwinds everything it
/// picked up along the way.
#[derive(Copy, Clone)]
pub struct RcsHistory {
    entries: [Option<MClass>; RCS_INFO_HISTORY_SIZE],
    len: usize,
}

impl RcsHistory {
    pub const fn new() -> Self {
        RcsHistory {
            entries: [None; RCS_INFO_HISTORY_SIZE],
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Push a class onto the history. Overflow (more than
    /// RCS_INFO_HISTORY_SIZE nested classes) is a programming error and
    /// fail-stops, matching §4.3's "overflow is a programming error".
    pub fn push(&mut self, class: MClass) {
        if self.len >= RCS_INFO_HISTORY_SIZE {
            panic!("rcs history overflow");
        }
        self.entries[self.len] = Some(class);
        self.len += 1;
    }

    pub fn contains(&self, class: MClass) -> bool {
        self.entries[..self.len].iter().any(|e| *e == Some(class))
    }

    /// Drain the whole history, exiting each class's R.C.S. in reverse
    /// entry order.
    pub fn exit_all(&mut self) {
        while self.len > 0 {
            self.len -= 1;
            if let Some(class) = self.entries[self.len].take() {
                exit(class);
            }
        }
    }

    /// Hardware-interrupt variant (§4.3): exit only the one class named
    /// by the interrupt, not the whole history.
    pub fn exit_one(&mut self, class: MClass) {
        for slot in self.entries[..self.len].iter_mut() {
            if *slot == Some(class) {
                *slot = None;
                exit(class);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_entries_do_not_block_each_other() {
        enter(MClass::Buf);
        enter(MClass::Buf);
        assert_eq!(participant_count(MClass::Buf), 2);
        exit(MClass::Buf);
        assert_eq!(participant_count(MClass::Buf), 1);
        exit(MClass::Buf);
        assert_eq!(participant_count(MClass::Buf), 0);
        assert!(enter_exclusive(MClass::Buf));
        exit_exclusive(MClass::Buf);
    }

    #[test]
    fn history_tracks_and_drains() {
        let mut h = RcsHistory::new();
        h.push(MClass::File);
        h.push(MClass::Inode);
        assert!(h.contains(MClass::File));
        assert!(h.contains(MClass::Inode));
        h.exit_all();
        assert!(!h.contains(MClass::File));
    }
}
