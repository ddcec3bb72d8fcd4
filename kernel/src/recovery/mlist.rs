//! Object registry (C1): "which kernel object of class C contains
//! address a?" Every tracked allocation registers on creation and
//! deregisters on destruction; `lookup` answers the containment query.
//!
//! The original keeps entries in intrusive pages linked through a
//! reserved last slot, growing one page at a time. That trick exists to
//! avoid a fixed bound under a bump allocator; in safe Rust a bounded
//! array is the idiomatic equivalent when the bound is generous (the
//! kernel's own NPROC/NFILE/NINODE/NBUF caps already fix the maximum
//! live count per class), so each class gets one fixed-capacity table
//! rather than a page chain. Growth past capacity is the same failure
//! the original treats as fatal to the recovery attempt.

use crate::recovery::config::MLIST_PAGE_SLOTS;
use crate::recovery::error::{RecoveryError, RecoveryResult};
use crate::spinlock::Spinlock;

/// Registered object classes (§3).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MClass {
    Buf,
    File,
    Inode,
    Log,
    LogHeader,
    Pipe,
    Sleeplock,
    Spinlock,
    Console,
    Devsw,
    Print,
    KMem,
    Run,
    PageTable,
}

pub const NUM_CLASSES: usize = 14;

fn class_index(c: MClass) -> usize {
    c as usize
}

const CAPACITY: usize = MLIST_PAGE_SLOTS * 16;

/// A page-table M-List entry additionally packs `(pid, level)` into the
/// low bits of the tracked address per §4.1, since the same physical
/// page can appear at different levels for different processes.
#[derive(Copy, Clone)]
struct Entry {
    addr: usize,
    span: usize,
    used: bool,
    pid: u32,
    level: u8,
}

const EMPTY_ENTRY: Entry = Entry {
    addr: 0,
    span: 0,
    used: false,
    pid: 0,
    level: 0,
};

struct ClassTable {
    lock: Spinlock,
    entries: [Entry; CAPACITY],
    count: usize,
}

impl ClassTable {
    const fn new(name: &'static str) -> Self {
        ClassTable {
            lock: Spinlock::init_lock(name),
            entries: [EMPTY_ENTRY; CAPACITY],
            count: 0,
        }
    }
}

pub struct MList {
    tables: [ClassTable; NUM_CLASSES],
}

static mut MLIST: MList = MList {
    tables: [
        ClassTable::new("mlist.buf"),
        ClassTable::new("mlist.file"),
        ClassTable::new("mlist.inode"),
        ClassTable::new("mlist.log"),
        ClassTable::new("mlist.logheader"),
        ClassTable::new("mlist.pipe"),
        ClassTable::new("mlist.sleeplock"),
        ClassTable::new("mlist.spinlock"),
        ClassTable::new("mlist.console"),
        ClassTable::new("mlist.devsw"),
        ClassTable::new("mlist.print"),
        ClassTable::new("mlist.kmem"),
        ClassTable::new("mlist.run"),
        ClassTable::new("mlist.pagetable"),
    ],
};

pub fn mlist_init() {
    // Tables are fully initialized by their `const fn` constructors;
    // nothing dynamic to set up.
}

fn class_size(class: MClass) -> usize {
    match class {
        MClass::Buf => core::mem::size_of::<crate::buf::Buf>(),
        MClass::File => core::mem::size_of::<crate::file::File>(),
        MClass::Inode => core::mem::size_of::<crate::file::INode>(),
        MClass::PageTable => crate::riscv::PGSIZE,
        // A `Run` witness spans the whole free page it heads, not just
        // the `next` pointer at its base, since a UE anywhere in a free
        // page needs to hit the same witness.
        MClass::Run => crate::riscv::PGSIZE,
        _ => 1,
    }
}

/// Register `addr` as belonging to `class`. Idempotent: registering the
/// same address twice is a no-op.
pub fn register(addr: usize, class: MClass) -> RecoveryResult<()> {
    register_ex(addr, class_size(class), class, 0, 0)
}

/// Register with explicit span and, for the page-table class, the
/// owning (pid, level) pair that `MLNODE2PA`/`MLNODE2PID`/`MLNODE2LEVEL`
/// pack into the low bits of the original's single machine word.
pub fn register_ex(addr: usize, span: usize, class: MClass, pid: u32, level: u8) -> RecoveryResult<()> {
    let table = unsafe { &mut MLIST.tables[class_index(class)] };
    table.lock.acquire();

    for e in table.entries.iter() {
        if e.used && e.addr == addr && e.pid == pid && e.level == level {
            table.lock.release();
            return Ok(());
        }
    }

    for e in table.entries.iter_mut() {
        if !e.used {
            *e = Entry {
                addr,
                span,
                used: true,
                pid,
                level,
            };
            table.count += 1;
            table.lock.release();
            return Ok(());
        }
    }

    table.lock.release();
    Err(RecoveryError::OutOfMemory)
}

/// Deregister. `span == 0` means exact match on `addr`; `span > 0`
/// removes any entry whose range overlaps `[addr, addr+span)`.
pub fn deregister(addr: usize, class: MClass, span: usize) {
    let table = unsafe { &mut MLIST.tables[class_index(class)] };
    table.lock.acquire();
    for e in table.entries.iter_mut() {
        if !e.used {
            continue;
        }
        let hit = if span == 0 {
            e.addr == addr
        } else {
            addr < e.addr + e.span.max(1) && e.addr < addr + span
        };
        if hit {
            *e = EMPTY_ENTRY;
            table.count -= 1;
        }
    }
    table.lock.release();
}

/// Answer "which registered object (if any) contains `addr`?" by
/// returning the object's base address.
pub fn lookup(addr: usize, class: MClass) -> Option<usize> {
    let table = unsafe { &mut MLIST.tables[class_index(class)] };
    table.lock.acquire();
    let mut found = None;
    for e in table.entries.iter() {
        if e.used && addr >= e.addr && addr < e.addr + e.span.max(1) {
            found = Some(e.addr);
            break;
        }
    }
    table.lock.release();
    found
}

/// Page-table-specific lookup: also returns the owning pid and level,
/// since the same address can legitimately collide across processes.
pub fn lookup_pagetable(addr: usize) -> Option<(usize, u32, u8)> {
    let table = unsafe { &mut MLIST.tables[class_index(MClass::PageTable)] };
    table.lock.acquire();
    let mut found = None;
    for e in table.entries.iter() {
        if e.used && addr >= e.addr && addr < e.addr + e.span.max(1) {
            found = Some((e.addr, e.pid, e.level));
            break;
        }
    }
    table.lock.release();
    found
}

/// Call `f` with the base address of every currently-registered entry
/// of `class`, skipping `skip` if it appears. Lets a handler rebuild an
/// object from the full set of live witnesses instead of a single one
/// (the `Run` free-list reconstruction needs exactly this).
pub fn for_each(class: MClass, skip: usize, mut f: impl FnMut(usize)) {
    let table = unsafe { &mut MLIST.tables[class_index(class)] };
    table.lock.acquire();
    for e in table.entries.iter() {
        if e.used && e.addr != skip {
            f(e.addr);
        }
    }
    table.lock.release();
}

pub fn count(class: MClass) -> usize {
    let table = unsafe { &mut MLIST.tables[class_index(class)] };
    table.lock.acquire();
    let c = table.count;
    table.lock.release();
    c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup_is_found() {
        register(0x1000, MClass::Buf).unwrap();
        assert_eq!(lookup(0x1000, MClass::Buf), Some(0x1000));
        deregister(0x1000, MClass::Buf, 0);
        assert_eq!(lookup(0x1000, MClass::Buf), None);
    }

    #[test]
    fn duplicate_register_is_noop() {
        register(0x2000, MClass::File).unwrap();
        register(0x2000, MClass::File).unwrap();
        assert_eq!(count(MClass::File), 1);
        deregister(0x2000, MClass::File, 0);
    }

    #[test]
    fn round_trip_leaves_lookup_null() {
        register(0x3000, MClass::Inode).unwrap();
        deregister(0x3000, MClass::Inode, 0);
        assert_eq!(lookup(0x3000, MClass::Inode), None);
    }

    #[test]
    fn for_each_skips_the_given_address_only() {
        register(0x4000, MClass::Run).unwrap();
        register(0x5000, MClass::Run).unwrap();
        register(0x6000, MClass::Run).unwrap();

        let mut seen = 0usize;
        for_each(MClass::Run, 0x5000, |addr| {
            assert_ne!(addr, 0x5000);
            seen += 1;
        });
        assert_eq!(seen, 2);

        deregister(0x4000, MClass::Run, 0);
        deregister(0x5000, MClass::Run, 0);
        deregister(0x6000, MClass::Run, 0);
    }
}
