use core::mem::size_of;
use core::ptr::addr_of_mut;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::file::FDType::{Device, Inode, None as FdNone, Pipe};
use crate::file::File;
use crate::log::{begin_op, end_op};
use crate::param::NFILE;
use crate::recovery::mlist::{self, MClass};
use crate::spinlock::Spinlock;

struct FTable {
    lock: Spinlock,
    file: [File; NFILE],
}

impl FTable {
    const fn new(name: &'static str) -> Self {
        FTable {
            lock: Spinlock::init_lock(name),
            file: [File::create(); NFILE],
        }
    }
}

// Two backing tables so a wholesale-replacement recovery (§4.6.2) can
// build the survivor set in the one `FTABLE_PTR` doesn't currently
// point at, then swap it in with a single atomic store. The table a UE
// actually hit is abandoned outright, along with anything adjacent to
// the broken slot that might also be suspect.
static mut FTABLE_A: FTable = FTable::new("ftable.a");
static mut FTABLE_B: FTable = FTable::new("ftable.b");

static FTABLE_PTR: AtomicPtr<FTable> = AtomicPtr::new(unsafe { addr_of_mut!(FTABLE_A) });

unsafe fn ftable() -> &'static mut FTable {
    &mut *FTABLE_PTR.load(Ordering::Acquire)
}

unsafe fn ftable_other(current: *mut FTable) -> &'static mut FTable {
    if current == addr_of_mut!(FTABLE_A) {
        &mut FTABLE_B
    } else {
        &mut FTABLE_A
    }
}

pub fn fileinit() {
    unsafe {
        for f in &ftable().file {
            let _ = mlist::register(f as *const File as usize, MClass::File);
        }
    }
}

// Allocate a file structure.
pub fn filealloc() -> Option<&'static mut File> {
    unsafe {
        let ft = ftable();
        ft.lock.acquire();
        for f in &mut ft.file {
            if f.ref_cnt == 0 {
                f.ref_cnt = 1;
                ft.lock.release();
                return Some(f);
            }
        }

        ft.lock.release();
        return None;
    }
}

// Increment ref count for file f.
pub(crate) fn filedup(f: *mut File) {
    unsafe {
        let ft = ftable();
        ft.lock.acquire();
        let f = f.as_mut().unwrap();
        if f.ref_cnt < 1 {
            panic!("filedup")
        }

        f.ref_cnt += 1;
        ft.lock.release();
    }
}

// Close file f.  (Decrement ref count, close when reaches 0.)
pub(crate) fn fileclose(f: &mut File) {
    unsafe {
        let ft = ftable();
        ft.lock.acquire();
        if f.ref_cnt < 1 {
            panic!("fileclose");
        }

        f.ref_cnt -= 1;
        if f.ref_cnt > 0 {
            ft.lock.release();
            return;
        }

        let file_type = f.file_type;
        let pipe = f.pipe;
        let writable = f.writable;
        let ip = f.ip;

        f.ref_cnt = 0;
        f.file_type = FdNone;
        ft.lock.release();

        if file_type == Pipe {
            pipe.unwrap().as_mut().unwrap().close(writable);
        } else if file_type == Inode || file_type == Device {
            begin_op();
            ip.unwrap().as_mut().unwrap().iput();
            end_op();
        }
    }
}

/// Recovery-handler entry point (C6.2): allocate a fresh file table,
/// shallow-copy every surviving slot into it (dropping the broken one),
/// swap `FTABLE_PTR` to the new table in one atomic store, and redirect
/// every live process's `ofile` entries from the old table's addresses
/// to the new table's, per §4.6.2. The old table — and whatever memory
/// around the broken slot might also be suspect — is never touched
/// again. Returns the descriptor's prior `(file_type, pipe)` so the
/// pipe handler can notice a severed sibling.
pub(crate) fn recover_file_slot(addr: usize) -> Option<(crate::file::FDType, Option<*mut crate::pipe::Pipe>)> {
    unsafe {
        let old_ptr = FTABLE_PTR.load(Ordering::Acquire);
        let old = &mut *old_ptr;
        old.lock.acquire();

        let idx = old.file.iter().position(|f| f as *const File as usize == addr);
        let Some(idx) = idx else {
            old.lock.release();
            return None;
        };
        let prior = (old.file[idx].file_type, old.file[idx].pipe);

        let new = ftable_other(old_ptr);
        new.lock.acquire();
        for i in 0..NFILE {
            new.file[i] = if i == idx { File::create() } else { old.file[i] };
        }
        new.lock.release();

        let new_ptr = new as *mut FTable;
        FTABLE_PTR.store(new_ptr, Ordering::Release);
        old.lock.release();

        for f in &old.file {
            mlist::deregister(f as *const File as usize, MClass::File, 0);
        }
        for f in &new.file {
            let _ = mlist::register(f as *const File as usize, MClass::File);
        }

        let coop = crate::recovery::user_coop_enabled();
        let old_base = &(*old_ptr).file as *const _ as usize;
        let new_base = &(*new_ptr).file as *const _ as usize;
        crate::proc::for_each_live_proc(|p| {
            for fd in 0..p.ofile.len() {
                let Some(fp) = p.ofile[fd] else { continue };
                let off = fp as usize;
                if off < old_base || off >= old_base + NFILE * size_of::<File>() {
                    continue;
                }
                let slot = (off - old_base) / size_of::<File>();
                if slot == idx {
                    p.ofile[fd] = None;
                    if coop {
                        p.open_args.mark_reserved(fd);
                    }
                } else {
                    p.ofile[fd] = Some((new_base + slot * size_of::<File>()) as *mut File);
                }
            }
        });

        Some(prior)
    }
}
