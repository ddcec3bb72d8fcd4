use core::mem;
use core::ptr::addr_of_mut;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::bio::{bpin, bread, brelse, bunpin, bwrite};
use crate::buf::Buf;
use crate::fs::{SuperBlock, BSIZE};
use crate::param::LOGSIZE;
use crate::proc::{myproc, sleep, wakeup};
use crate::recovery::mlist::{self, MClass};
use crate::recovery::stackwalk::{Frame, FrameGuard};
use crate::recovery::trans;
use crate::spinlock::Spinlock;

// Simple logging that allows concurrent FS system calls.
//
// A log transaction contains the updates of multiple FS system
// calls. The logging system only commits when there are
// no FS system calls active. Thus there is never
// any reasoning required about whether a commit might
// write an uncommitted system call's updates to disk.
//
// A system call should call begin_op()/end_op() to mark
// its start and end. Usually begin_op() just increments
// the count of in-progress FS system calls and returns.
// But if it thinks the log is close to running out, it
// sleeps until the last outstanding end_op() commits.
//
// The log is a physical re-do log containing disk blocks.

// Contents of the header block, used for both the on-disk header block
// and to keep track in memory of logged block# before commit.
#[derive(Copy, Clone)]
pub struct LogHeader {
    pub n: u32,
    pub block: [u32; LOGSIZE],
}

impl LogHeader {
    pub const fn empty() -> Self {
        LogHeader {
            n: 0,
            block: [0; LOGSIZE],
        }
    }
}

struct Log {
    lock: Spinlock,
    start: u32,
    size: u32,
    outstanding: i32, // how many FS sys calls are executing.
    committing: i32,  // in commit(), please wait.
    dev: u32,
    lh: LogHeader,
}

static mut LOG_STORE: Log = Log {
    lock: Spinlock::init_lock("log"),
    start: 0,
    size: 0,
    outstanding: 0,
    committing: 0,
    dev: 0,
    lh: LogHeader::empty(),
};

// A single backing store behind an AtomicPtr, the way `KMem`'s free
// list and `FTable`/`ITable` are: `Log`'s own recovery reinitializes in
// place rather than swapping buffers, but going through `log()` keeps
// every read of the struct on the same indirection SPEC_FULL.md's other
// wholesale-replacement tables use.
static LOG_PTR: AtomicPtr<Log> = AtomicPtr::new(unsafe { addr_of_mut!(LOG_STORE) });

unsafe fn log() -> &'static mut Log {
    &mut *LOG_PTR.load(Ordering::Acquire)
}

pub fn initlog(dev: u32, sb: &SuperBlock) {
    if mem::size_of::<LogHeader>() >= BSIZE {
        panic!("initlog: too big logheader");
    }

    unsafe {
        log().start = sb.logstart;
        log().size = sb.nlog;
        log().dev = dev;
        recover_from_log();

        let _ = mlist::register(log() as *const Log as usize, MClass::Log);
        let _ = mlist::register(core::ptr::addr_of!(log().lh) as usize, MClass::LogHeader);
    }
}

unsafe fn recover_from_log() {
    read_head();
    install_trans(true); // if committed, copy from log to disk
    log().lh.n = 0;
    write_head(); // clear the log
}

// Read the log header from disk into the in-memory log header
unsafe fn read_head() {
    let buf = bread(log().dev, log().start);
    let (_head, body, _tail) = buf.data[0..mem::size_of::<LogHeader>()].align_to::<LogHeader>();
    let lh = &body[0];
    log().lh.n = lh.n;
    for i in 0..log().lh.n as usize {
        log().lh.block[i] = lh.block[i];
    }
    brelse(buf);
}

// Copy committed blocks from log to their home location
unsafe fn install_trans(recovering: bool) {
    let _g = FrameGuard::enter(Frame::LogInstallTrans);
    for tail in 0..log().lh.n as usize {
        let lbuf = bread(log().dev, log().start + tail as u32 + 1); // read log block
        let dbuf = bread(log().dev, log().lh.block[tail]); // read dst
        dbuf.data[..].clone_from_slice(&lbuf.data[..]);
        bwrite(dbuf); // write dst to disk
        if !recovering {
            bunpin(dbuf as *mut Buf);
        }
        brelse(lbuf);
        brelse(dbuf);
    }
}

// Write in-memory log header to disk. This is the true point at which
// the current transaction commits.
unsafe fn write_head() {
    let buf = bread(log().dev, log().start);
    let (_head, body, _tail) = buf.data[0..mem::size_of::<LogHeader>()].align_to_mut::<LogHeader>();
    let hb = &mut body[0];
    hb.n = log().lh.n;
    for i in 0..log().lh.n as usize {
        hb.block[i] = log().lh.block[i];
    }
    bwrite(buf);
    brelse(buf);
}

// called at the start of each FS system call.
pub fn begin_op() {
    let p = myproc();
    unsafe {
        log().lock.acquire();
        loop {
            if log().committing != 0
                || (log().lh.n as usize + (log().outstanding as usize + 1) * crate::param::MAXOPBLOCKS
                    > LOGSIZE)
            {
                sleep(&*log(), &mut log().lock);
            } else {
                log().outstanding += 1;
                trans::enter_trans_log(p);
                log().lock.release();
                break;
            }
        }
    }
}

// called at the end of each FS system call. commits if this was the
// last outstanding operation.
pub fn end_op() {
    let p = myproc();
    let mut do_commit = false;

    unsafe {
        log().lock.acquire();
        log().outstanding -= 1;
        trans::exit_trans_log(p);
        if log().committing != 0 {
            panic!("end_op: log committing");
        }
        if log().outstanding == 0 {
            do_commit = true;
            log().committing = 1;
        } else {
            wakeup(log() as *const Log as *const u8);
        }
        log().lock.release();
    }

    if do_commit {
        unsafe {
            commit();
            log().lock.acquire();
            log().committing = 0;
            log().lock.release();
        }
        wakeup(unsafe { log() as *const Log as *const u8 });
    }
}

unsafe fn commit() {
    let _g = FrameGuard::enter(Frame::LogCommit);
    if log().lh.n > 0 {
        write_log();
        write_head(); // commit point
        install_trans(false);
        log().lh.n = 0;
        write_head(); // erase transaction from log
    }
}

// Copy modified blocks from the cache to the log.
unsafe fn write_log() {
    for tail in 0..log().lh.n as usize {
        let to = bread(log().dev, log().start + tail as u32 + 1);
        let from = bread(log().dev, log().lh.block[tail]);
        to.data[..].clone_from_slice(&from.data[..]);
        bwrite(to);
        brelse(from);
        brelse(to);
    }
}

// Caller has modified b->data and is done with the buffer. Record the
// block number and pin in the cache by increasing refcnt. commit()
// will do the disk write.
pub fn log_write(b: &mut Buf) {
    unsafe {
        log().lock.acquire();
        if log().lh.n as usize >= LOGSIZE || log().lh.n >= log().size - 1 {
            panic!("too big a transaction");
        }

        if log().outstanding < 1 {
            panic!("log_write outside of trans");
        }

        let mut idx = log().lh.n as usize;
        for i in 0..log().lh.n as usize {
            if log().lh.block[i] == b.blockno {
                idx = i;
                break;
            }
        }

        log().lh.block[idx] = b.blockno;
        if idx == log().lh.n as usize {
            bpin(b);
            log().lh.n += 1;
        }

        log().lock.release();
    }
}

/// Snapshot of the in-memory header, used by [`trans::enter_trans_log`]
/// to capture a pre-image before a mutation.
pub fn snapshot_header() -> LogHeader {
    unsafe { log().lh }
}

pub fn outstanding() -> i32 {
    unsafe { log().outstanding }
}

/// Recovery-handler entry point (C6.4): rebuild the log object from the
/// on-disk superblock and the shadow header, decrement the outstanding
/// count for the syscall that was interrupted (it is being abandoned,
/// not completed, so it never reaches its own `end_op`), then drain the
/// faulted process's remaining buffer references the way `brelse` would.
pub fn recover_log(dev: u32, sb: &SuperBlock, faulted_pid: u32) {
    unsafe {
        log().lh = trans::log_header_pre_image();
        log().outstanding = (trans::log_outstanding_pre_image() - 1).max(0);
        log().dev = dev;
        log().start = sb.logstart;
        log().size = sb.nlog;
        log().committing = 0;
        log().lock.reinit("log");

        if log().outstanding == 0 {
            commit();
        }
    }

    crate::bio::recover_release_held(faulted_pid);
}
