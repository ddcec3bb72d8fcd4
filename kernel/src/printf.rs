use core::fmt::{Arguments, Write};
use core::ptr::addr_of_mut;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::console::console;
use crate::recovery::mlist::{self, MClass};
use crate::recovery::stackwalk::{Frame, FrameGuard};
use crate::spinlock::Spinlock;

static mut PRINTER_STORE: Printer = Printer {
    lock: Spinlock::init_lock("pr"),
    locking: true,
};

// Single backing store behind an AtomicPtr, like the other recovered
// singletons; `printer()` is the one indirection everything reads
// through.
static PRINTER_PTR: AtomicPtr<Printer> = AtomicPtr::new(unsafe { addr_of_mut!(PRINTER_STORE) });

pub fn printer() -> &'static mut Printer {
    unsafe { &mut *PRINTER_PTR.load(Ordering::Acquire) }
}

#[macro_export]
macro_rules! printf
{
	($($arg:tt)*) => {
        crate::printf::printer().printf(core::format_args!($($arg)*))
    };
}

/// lock to avoid interleaving concurrent printf's.
pub struct Printer {
    lock: Spinlock,
    locking: bool,
}

impl Printer {
    pub fn init() {
        let _ = mlist::register(printer() as *const Printer as usize, MClass::Print);
    }

    // Print to the console. only understands %d, %x, %p, %s.
    pub fn printf(self: &mut Self, args: Arguments<'_>) {
        let _g = FrameGuard::enter(Frame::Printf);
        let locking = self.locking;
        if locking {
            self.lock.acquire();
        }

        let _ = unsafe { console().write_fmt(args).unwrap() };

        if locking {
            self.lock.release()
        }
    }

    /// Recovery-handler entry point (C6.7): re-initialize the printer
    /// lock in place.
    pub(crate) fn recover(&mut self, addr: usize) -> bool {
        if addr != self as *mut Printer as usize {
            return false;
        }
        self.lock.reinit("pr");
        self.locking = true;
        true
    }
}

#[macro_export]
macro_rules! debug_log {
	($($arg:tt)*) => {
        #[cfg(log_level = "debug")]
        crate::printf!($($arg)*)
    };
}