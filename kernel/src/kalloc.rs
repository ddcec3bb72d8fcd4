use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::memlayout::PHYSTOP;
use crate::recovery::mlist::{self, MClass};
use crate::recovery::trans;
use crate::riscv::PGSIZE;
use crate::spinlock::Spinlock;
use crate::string::memset;
use crate::PGROUNDUP;

extern "C" {
    // first address after kernel.
    // defined by kernel.ld.
    static mut end: u8;
}

pub(crate) struct Run {
    next: *mut Run,
}

pub struct KMem {
    lock: Spinlock,
    // `AtomicPtr` so `recover_kmem` can repoint the head with a single
    // atomic store: a reader racing the recovery never sees a partially
    // relinked list, just the old head or the new one.
    freelist: AtomicPtr<Run>,
}

pub static mut KMEM: KMem = KMem::create();

impl KMem {
    const fn create() -> Self {
        Self {
            lock: Spinlock::init_lock("kmem"),
            freelist: AtomicPtr::new(ptr::null_mut()),
        }
    }
    pub fn kinit() {
        unsafe {
            let _ = mlist::register(core::ptr::addr_of!(KMEM) as usize, MClass::KMem);
            KMEM.freerange((&mut end) as *mut u8, PHYSTOP as *mut u8);
        }

        // printf!("finish init from {:x}, to {:x}", unsafe { (&end as *const u8).expose_addr() }, PHYSTOP);
    }

    fn freerange<T: Sized>(self: &mut Self, pa_start: *mut T, pa_end: *mut T) {
        let mut p = PGROUNDUP!(pa_start);
        while p + PGSIZE <= pa_end as usize {
            self.kfree(p as *mut T);
            p += PGSIZE;
        }
    }

    /// Free the page of physical memory pointed at by pa,
    /// which normally should have been returned by a
    /// call to kalloc().  (The exception is when
    /// initializing the allocator; see kinit above.)
    pub fn kfree<T: Sized>(self: &mut Self, pa: *mut T) {
        unsafe {
            let pa_uszie = pa as usize;
            if pa_uszie % PGSIZE != 0
                || pa_uszie < ((&end) as *const u8) as usize
                || pa_uszie >= PHYSTOP
            {
                panic!("kfree");
            }
        }

        // Fill with junk to catch dangling refs.
        memset(pa as *mut u8, 1, PGSIZE);

        let r = pa as *mut Run;

        self.lock.acquire();
        match crate::proc::current_proc() {
            Some(p) => {
                trans::enter_trans_run(p, r);
                unsafe {
                    (*r).next = self.freelist.load(Ordering::Relaxed);
                }
                self.freelist.store(r, Ordering::Release);
                // Registers the freed page as a `Run` witness (C1) so a
                // `KMem`/`Run`-class recovery can rebuild the list from
                // the set of currently-free pages without this one ever
                // being left unreachable.
                let _ = mlist::register(r as usize, MClass::Run);
                trans::exit_trans_run(p);
            }
            None => unsafe {
                (*r).next = self.freelist.load(Ordering::Relaxed);
                self.freelist.store(r, Ordering::Release);
                let _ = mlist::register(r as usize, MClass::Run);
            },
        }
        self.lock.release();
    }

    /// Allocate one 4096-byte page of physical memory.
    /// Returns a pointer that the kernel can use.
    /// Returns 0 if the memory cannot be allocated.
    pub fn kalloc<T: Sized>(self: &mut Self) -> *mut T {
        self.lock.acquire();
        let r = self.freelist.load(Ordering::Acquire);
        if !r.is_null() {
            unsafe {
                self.freelist.store((*r).next, Ordering::Release);
            }
        }
        self.lock.release();

        if !r.is_null() {
            mlist::deregister(r as usize, MClass::Run, 0);
            memset(r as *mut u8, 5, PGSIZE); // fill with junk
        }
        r as *mut T
    }

    /// Recovery-handler entry point (C6.6): rebuild the free list from
    /// every surviving `Run` witness, skipping the broken node (if the
    /// fault landed on one; a `KMem`-class fault hits the allocator
    /// struct itself, which registers no witness of its own, so nothing
    /// is skipped), and repoint the allocator at the fresh head in one
    /// atomic store. The in-flight splice case never reaches here —
    /// `trans::check_and_handle_run` recovers that before the tracker
    /// classifies the address.
    pub(crate) fn recover_kmem(self: &mut Self, broken_addr: usize) {
        self.lock.acquire();
        let mut head: *mut Run = ptr::null_mut();
        mlist::for_each(MClass::Run, broken_addr, |addr| {
            let node = addr as *mut Run;
            unsafe {
                (*node).next = head;
            }
            head = node;
        });
        self.freelist.store(head, Ordering::Release);
        self.lock.release();
        mlist::deregister(broken_addr, MClass::Run, 0);
    }
}
