use core::ptr::addr_of_mut;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::fs::NDIRECT;
use crate::param::NDEV;
use crate::pipe::Pipe;
use crate::sleeplock::Sleeplock;
use crate::stat::FileType;

pub mod file;

#[derive(Copy, Clone, Eq, PartialEq)]
pub enum FDType {
    None,
    Pipe,
    Inode,
    Device,
}

// `pipe`/`ip` are raw pointers rather than borrows: a recovery handler
// swaps them under the file-table lock when the pointee is replaced
// wholesale, which a borrow cannot express.
#[derive(Copy, Clone)]
pub struct File {
    pub(crate) file_type: FDType,
    pub(crate) ref_cnt: i32, // reference count
    pub(crate) readable: bool,
    pub(crate) writable: bool,
    pub(crate) pipe: Option<*mut Pipe>, // FDType::Pipe
    pub(crate) ip: Option<*mut INode>,  // FDType::Inode and FDType::Device
    pub(crate) off: u32,                // FDType::Inode
    pub(crate) major: i16,              // FDType::Device
}

impl File {
    pub const fn create() -> Self {
        Self {
            file_type: FDType::None,
            ref_cnt: 0,
            readable: false,
            writable: false,
            pipe: None,
            ip: None,
            off: 0,
            major: 0,
        }
    }
}

#[macro_export]
macro_rules! major {
    ( $dev:expr ) => {
        $dev >> 16 & 0xFFFF
    };
}

#[macro_export]
macro_rules! minor {
    ( $dev:expr ) => {
        $dev & 0xFFFF
    };
}

#[macro_export]
macro_rules! mkdev {
    ( $m:expr, $n:expr ) => {
        ($m << 16 | $n) as u32
    };
}

// in-memory copy of an inode
#[derive(Copy, Clone)]
pub struct INode {
    pub(crate) dev: u32, // Device number
    pub(crate) inum: u32, // Inode number
    pub(crate) ref_cnt: i32, // Reference count
    pub(crate) lock: Sleeplock, // protects everything below here
    pub(crate) valid: bool, // inode has been read from disk?

    pub(crate) file_type: FileType, // copy of disk inode
    pub(crate) major: i16,
    pub(crate) minor: i16,
    pub(crate) nlink: i16,
    pub(crate) size: u32,
    pub(crate) addrs: [u32; NDIRECT + 1]
}

impl INode {
    pub const fn create(lock_name: &'static str) -> Self {
        Self {
            dev: 0,
            inum: 0,
            ref_cnt: 0,
            lock: Sleeplock::init_lock(lock_name),
            valid: false,
            file_type: FileType::Unused,
            major: 0,
            minor: 0,
            nlink: 0,
            size: 0,
            addrs: [0; NDIRECT + 1],
        }
    }
}

type DevswTable = [Option<*mut dyn Devsw>; NDEV];

static mut DEVSW_STORE: DevswTable = [None; NDEV];

// A fat `*mut dyn Devsw` can't live inside an `AtomicPtr` itself, but the
// whole table is `Sized`, so the table as a unit goes behind one
// `AtomicPtr` the same way `KMem`/`FTable`/`ITable`/`Log` do.
static DEVSW_PTR: AtomicPtr<DevswTable> = AtomicPtr::new(unsafe { addr_of_mut!(DEVSW_STORE) });

unsafe fn devsw() -> &'static mut DevswTable {
    &mut *DEVSW_PTR.load(Ordering::Acquire)
}

// map major device number to device functions.
pub trait Devsw {
    fn read(&mut self, is_user_dst: bool, dst: usize, sz: usize) -> i32;
    fn write(&mut self, is_user_src: bool, src: usize, sz: usize) -> i32;
}

pub const CONSOLE: usize = 1;

pub fn devsw_read(major: i16, is_user_dst: bool, dst: usize, sz: usize) -> i32 {
    if major < 0 || major as usize >= NDEV {
        return -1;
    }
    unsafe {
        match devsw()[major as usize] {
            Some(d) => (*d).read(is_user_dst, dst, sz),
            None => -1,
        }
    }
}

pub fn devsw_write(major: i16, is_user_src: bool, src: usize, sz: usize) -> i32 {
    if major < 0 || major as usize >= NDEV {
        return -1;
    }
    unsafe {
        match devsw()[major as usize] {
            Some(d) => (*d).write(is_user_src, src, sz),
            None => -1,
        }
    }
}

/// Used by the device-switch recovery handler to drop a stale trait
/// object pointer before the owning struct's address is reused.
pub fn devsw_clear(major: usize) {
    if major < NDEV {
        unsafe {
            devsw()[major] = None;
        }
    }
}

pub fn devsw_set(major: usize, dev: *mut dyn Devsw) {
    if major < NDEV {
        unsafe {
            devsw()[major] = Some(dev);
        }
    }
}
