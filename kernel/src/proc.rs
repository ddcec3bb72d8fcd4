use core::mem;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::file::file::filedup;
use crate::file::{File, INode};
use crate::kalloc::KMEM;
use crate::KSTACK;
use crate::memlayout::{TRAMPOLINE, TRAPFRAME};
use crate::param::{NCPU, NOFILE, NPROC};
use crate::proc::Procstate::{Recovering, Runnable, Running, Sleeping, Unused, Used, Zombie};
use crate::recovery::mlist::{self, MClass};
use crate::recovery::rcs::RcsHistory;
use crate::recovery::stackwalk::{CallStack, Frame, FrameGuard};
use crate::recovery::trans::TransCounters;
use crate::recovery::usercoop::OpenArgsTable;
use crate::riscv::{r_tp, PageTable, PGSIZE, PTE_R, PTE_W, PTE_X};
use crate::spinlock::{pop_off, push_off, Spinlock};
use crate::string::safestrcpy;
use crate::vm::{kvmmap, mappages, trampoline, uvmcopy, uvmcreate, uvmfirst, uvmfree, uvmunmap};

// Saved registers for kernel context switches.
#[derive(Copy, Clone)]
pub struct Context {
    pub ra: u64,
    pub sp: u64,

    // callee-saved
    pub s0: u64,
    pub s1: u64,
    pub s2: u64,
    pub s3: u64,
    pub s4: u64,
    pub s5: u64,
    pub s6: u64,
    pub s7: u64,
    pub s8: u64,
    pub s9: u64,
    pub s10: u64,
    pub s11: u64,
}

impl Context {
    const fn zeroed() -> Self {
        Context {
            ra: 0,
            sp: 0,
            s0: 0,
            s1: 0,
            s2: 0,
            s3: 0,
            s4: 0,
            s5: 0,
            s6: 0,
            s7: 0,
            s8: 0,
            s9: 0,
            s10: 0,
            s11: 0,
        }
    }
}

// Per-CPU state.
#[derive(Copy, Clone)]
pub struct Cpu<'a> {
    pub proc: Option<*mut Proc<'a>>, // The process running on this cpu, or null.
    pub context: Context,            // swtch() here to enter scheduler().
    pub noff: u8,                    // Depth of push_off() nesting.
    pub intena: bool,                // Were interrupts enabled before push_off()?
}

impl<'a> Cpu<'a> {
    const fn default() -> Self {
        Cpu {
            proc: None,
            context: Context::zeroed(),
            noff: 0,
            intena: false,
        }
    }
}

static mut CPUS: [Cpu; NCPU] = [Cpu::default(); NCPU];
static mut PROCS: [Proc; NPROC] = [Proc::default(); NPROC];

static mut INIT_PROC: Option<*mut Proc> = None;

extern "C" {
    pub static trampoline: u8; // trampoline.S
}

// per-process data for the trap handling code in trampoline.S.
// sits in a page by itself just under the trampoline page in the
// user page table.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct Trapframe {
    /*   0 */ pub kernel_satp: u64,  // kernel page table
    /*   8 */ pub kernel_sp: u64,    // top of process's kernel stack
    /*  16 */ pub kernel_trap: u64,  // usertrap()
    /*  24 */ pub epc: u64,          // saved user program counter
    /*  32 */ pub kernel_hartid: u64,
    /*  40 */ pub ra: u64,
    /*  48 */ pub sp: u64,
    /*  56 */ pub gp: u64,
    /*  64 */ pub tp: u64,
    /*  72 */ pub t0: u64,
    /*  80 */ pub t1: u64,
    /*  88 */ pub t2: u64,
    /*  96 */ pub s0: u64,
    /* 104 */ pub s1: u64,
    /* 112 */ pub a0: u64,
    /* 120 */ pub a1: u64,
    /* 128 */ pub a2: u64,
    /* 136 */ pub a3: u64,
    /* 144 */ pub a4: u64,
    /* 152 */ pub a5: u64,
    /* 160 */ pub a6: u64,
    /* 168 */ pub a7: u64,
    /* 176 */ pub s2: u64,
    /* 184 */ pub s3: u64,
    /* 192 */ pub s4: u64,
    /* 200 */ pub s5: u64,
    /* 208 */ pub s6: u64,
    /* 216 */ pub s7: u64,
    /* 224 */ pub s8: u64,
    /* 232 */ pub s9: u64,
    /* 240 */ pub s10: u64,
    /* 248 */ pub s11: u64,
    /* 256 */ pub t3: u64,
    /* 264 */ pub t4: u64,
    /* 272 */ pub t5: u64,
    /* 280 */ pub t6: u64,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Procstate {
    Unused,
    Used,
    Sleeping,
    Runnable,
    Running,
    Zombie,
    /// A recovery handler is repairing a structure this process faulted
    /// inside. Treated like Running for scheduling purposes; exit() may
    /// not tear the process down while it holds this state.
    Recovering,
}

// Per-process state
#[derive(Copy, Clone)]
pub struct Proc<'a> {
    pub lock: Spinlock,

    // p->lock must be held when using these:
    pub state: Procstate,
    pub chan: Option<*const u8>, // If non-null, sleeping on chan
    killed: u8,                  // If non-zero, have been killed
    pub xstate: i32,             // Exit status to be returned to parent's wait
    pub pid: u32,

    // wait_lock must be held when using this:
    pub parent: Option<*mut Proc<'a>>,

    // these are private to the process, so p->lock need not be held.
    pub kstack: usize,                        // Virtual address of kernel stack
    pub sz: usize,                             // Size of process memory (bytes)
    pub pagetable: Option<&'a mut PageTable>,  // User page table
    pub trapframe: Option<*mut Trapframe>,     // data page for trampoline.S
    pub context: Context,                      // swtch() here to run process
    pub ofile: [Option<*mut File>; NOFILE],    // Open files
    pub cwd: Option<*mut INode>,                // Current directory
    pub name: [u8; 16],                        // Process name (debugging)

    // Recovery-subsystem bookkeeping (C2/C3/C4/C8). Torn down in freeproc.
    pub rcs_history: RcsHistory,
    pub trans: TransCounters,
    pub call_stack: CallStack,
    pub open_args: OpenArgsTable,
    pub ptdup_root: Option<*mut crate::recovery::ptdup::PtdupRoot>,
}

impl<'a> Proc<'a> {
    const fn default() -> Self {
        Proc {
            lock: Spinlock::init_lock("proc"),
            state: Unused,
            chan: None,
            killed: 0,
            xstate: 0,
            pid: 0,
            parent: None,
            kstack: 0,
            sz: 0,
            pagetable: None,
            trapframe: None,
            context: Context::zeroed(),
            ofile: [None; NOFILE],
            cwd: None,
            name: [0; 16],
            rcs_history: RcsHistory::new(),
            trans: TransCounters::new(),
            call_stack: CallStack::new(),
            open_args: OpenArgsTable::new(),
            ptdup_root: None,
        }
    }

    pub fn killed(&self) -> u8 {
        self.killed
    }

    pub fn set_killed(&mut self, k: u8) {
        self.killed = k;
    }
}

static NEXT_PID: AtomicU32 = AtomicU32::new(1);
// helps ensure that wakeups of wait()ing
// parents are not lost. must be acquired before any p->lock.
static mut WAIT_LOCK: Spinlock = Spinlock::init_lock("wait_lock");

// Must be called with interrupts disabled, to prevent a race with a
// process being moved to a different CPU.
pub fn cpuid() -> usize {
    r_tp() as usize
}

// Return this CPU's cpu struct. Interrupts must be disabled.
pub fn mycpu() -> &'static mut Cpu<'static> {
    unsafe { &mut CPUS[cpuid()] }
}

// Return the currently-running process, or panic if none.
pub fn myproc() -> &'static mut Proc<'static> {
    current_proc().expect("myproc: no current process")
}

// Return the currently-running process, or None if called before any
// process has been scheduled (e.g. during early boot allocator setup).
pub fn current_proc() -> Option<&'static mut Proc<'static>> {
    push_off();
    let c = mycpu();
    let p = c.proc;
    pop_off();
    p.map(|p| unsafe { &mut *p })
}

fn allocpid() -> u32 {
    NEXT_PID.fetch_add(1, Ordering::Relaxed)
}

// Allocate a page for each process's kernel stack.
// Map it high in memory, followed by an invalid guard page.
pub fn proc_mapstacks(kpgtbl: &mut PageTable) {
    for idx in 0..NPROC {
        unsafe {
            let pa: *mut u8 = KMEM.kalloc();
            if pa.is_null() {
                panic!("kalloc");
            }
            let va = KSTACK!(idx);
            PROCS[idx].kstack = va;
            kvmmap(kpgtbl, va, pa as usize, PGSIZE, PTE_R | PTE_W);
        }
    }
}

// initialize the proc table.
pub fn procinit() {
    let _g = FrameGuard::enter(Frame::Procinit);
    // kstack addresses are assigned per-index in proc_mapstacks(); the
    // table itself is already zero-initialized via Proc::default().
    unsafe {
        let _ = mlist::register(core::ptr::addr_of!(WAIT_LOCK) as usize, MClass::Spinlock);
    }
}

// a user program that calls exec("/init")
// assembled from ../user/initcode.S
const INITCODE: [u8; 52] = [
    0x17, 0x05, 0x00, 0x00, 0x13, 0x05, 0x45, 0x02, 0x97, 0x05, 0x00, 0x00, 0x93, 0x85, 0x35,
    0x02, 0x93, 0x08, 0x70, 0x00, 0x73, 0x00, 0x00, 0x00, 0x93, 0x08, 0x20, 0x00, 0x73, 0x00,
    0x00, 0x00, 0xef, 0xf0, 0x9f, 0xff, 0x2f, 0x69, 0x6e, 0x69, 0x74, 0x00, 0x00, 0x24, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

// Set up first user process.
pub fn userinit() {
    let p = allocproc().expect("userinit: allocproc failed");
    unsafe {
        INIT_PROC = Some(p as *mut Proc);
    }

    // allocate one user page and copy initcode's instructions and data into it.
    uvmfirst(p.pagetable.as_mut().unwrap(), &INITCODE as *const u8, mem::size_of_val(&INITCODE));
    p.sz = PGSIZE;

    // prepare for the very first "return" from kernel to user.
    let tf = unsafe { &mut *p.trapframe.unwrap() };
    tf.epc = 0; // user program counter
    tf.sp = PGSIZE as u64; // user stack pointer

    safestrcpy(&mut p.name, b"initcode\0", 16);
    p.cwd = crate::fs::fs::namei(b"/\0").map(|ip| ip as *mut INode);

    p.state = Runnable;

    p.lock.release();
}

static FS_INITIALIZED: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);

// A fork child's very first scheduling by scheduler() swtch()es to forkret.
pub fn forkret() {
    // Still holding p->lock from scheduler.
    myproc().lock.release();

    if !FS_INITIALIZED.swap(true, Ordering::AcqRel) {
        // File system initialization must run in the context of a regular
        // process (it calls sleep), so it cannot run from main().
        crate::fs::fs::fsinit(crate::param::ROOTDEV);
    }

    crate::trap::usertrapret();
}

// Look in the process table for an UNUSED proc.
// If found, initialize state required to run in the kernel,
// and return with p->lock held. Returns None if no free proc or OOM.
fn allocproc() -> Option<&'static mut Proc<'static>> {
    let mut found: Option<&'static mut Proc<'static>> = None;
    for i in 0..NPROC {
        let p = unsafe { &mut PROCS[i] };
        p.lock.acquire();
        if p.state == Unused {
            found = Some(p);
            break;
        }
        p.lock.release();
    }

    let p = found?;
    p.pid = allocpid();
    p.state = Used;

    // Allocate a trapframe page.
    let trapframe_ptr: *mut Trapframe = unsafe { KMEM.kalloc() };
    if trapframe_ptr.is_null() {
        freeproc(p);
        p.lock.release();
        return None;
    }
    p.trapframe = Some(trapframe_ptr);

    // An empty user page table.
    p.pagetable = proc_pagetable(p);
    if p.pagetable.is_none() {
        freeproc(p);
        p.lock.release();
        return None;
    }

    // Set up new context to start executing at forkret, which returns to user space.
    p.context = Context::zeroed();
    p.context.ra = forkret as u64;
    p.context.sp = (p.kstack + PGSIZE) as u64;

    Some(p)
}

// free a proc structure and the data hanging from it, including user pages.
// p->lock must be held.
pub fn freeproc(p: &mut Proc<'static>) {
    let _g = FrameGuard::enter(Frame::Freeproc);
    if let Some(tf) = p.trapframe {
        unsafe { KMEM.kfree(tf) };
    }
    p.trapframe = None;

    if p.pagetable.is_some() {
        proc_freepagetable(p.pagetable.take().unwrap(), p.sz);
    }

    p.sz = 0;
    p.pid = 0;
    p.parent = None;
    p.name = [0; 16];
    p.chan = None;
    p.killed = 0;
    p.xstate = 0;
    p.state = Unused;
    p.rcs_history.clear();
    p.trans = TransCounters::new();
    p.call_stack.clear();
    p.open_args.clear();
    p.ptdup_root = None;
}

// Create a user page table for a given process, with no user memory,
// but with trampoline and trapframe pages.
fn proc_pagetable<'a>(p: &Proc<'a>) -> Option<&'a mut PageTable> {
    let pagetable = uvmcreate()?;

    // map the trampoline code (for system call return) at the highest
    // user virtual address. only the supervisor uses it, so not PTE_U.
    let trampoline_addr = (unsafe { &trampoline } as *const u8).expose_addr();
    if mappages(pagetable, TRAMPOLINE, trampoline_addr, PGSIZE, PTE_R | PTE_X) != 0 {
        uvmfree(pagetable, 0);
        return None;
    }

    // map the trapframe page just below the trampoline page.
    let trapframe_addr = p.trapframe.unwrap() as usize;
    if mappages(pagetable, TRAPFRAME, trapframe_addr, PGSIZE, PTE_R | PTE_W) < 0 {
        uvmunmap(pagetable, TRAMPOLINE, 1, false);
        uvmfree(pagetable, 0);
        return None;
    }

    Some(pagetable)
}

// Free a process's page table, and free the physical memory it refers to.
fn proc_freepagetable(pagetable: &mut PageTable, sz: usize) {
    uvmunmap(pagetable, TRAMPOLINE, 1, false);
    uvmunmap(pagetable, TRAPFRAME, 1, false);
    uvmfree(pagetable, sz);
}

// Create a new process, copying the parent. Sets up the child's kernel
// stack to return as if from the fork() system call.
pub fn fork() -> Option<u32> {
    let p = myproc();
    let np = allocproc()?;

    if uvmcopy(p.pagetable.as_mut().unwrap(), np.pagetable.as_mut().unwrap(), p.sz) < 0 {
        freeproc(np);
        np.lock.release();
        return None;
    }
    np.sz = p.sz;

    let sz = mem::size_of::<Trapframe>();
    unsafe {
        p.trapframe
            .unwrap()
            .copy_to(np.trapframe.unwrap(), sz);
        (*np.trapframe.unwrap()).a0 = 0; // fork returns 0 in the child
    }

    for i in 0..NOFILE {
        if let Some(f) = p.ofile[i] {
            filedup(f);
            np.ofile[i] = Some(f);
        }
    }
    np.cwd = p.cwd.map(|ip| unsafe { (&mut *ip).idup() as *mut INode });
    np.open_args = p.open_args.clone();

    safestrcpy(&mut np.name, &p.name, 16);

    let pid = np.pid;

    np.lock.release();

    unsafe { WAIT_LOCK.acquire() };
    np.parent = Some(p as *mut Proc);
    unsafe { WAIT_LOCK.release() };

    np.lock.acquire();
    np.state = Runnable;
    np.lock.release();

    Some(pid)
}

// Wake up every process sleeping on chan. Must be called without any
// p->lock held.
pub fn wakeup(chan: *const u8) {
    for i in 0..NPROC {
        let p = unsafe { &mut PROCS[i] };
        if p as *mut Proc as *const u8 != chan {
            p.lock.acquire();
            if p.state == Sleeping && p.chan == Some(chan) {
                p.state = Runnable;
            }
            p.lock.release();
        }
    }
}

// Atomically release lock and sleep on chan. Reacquires lock when awakened.
pub fn sleep<T>(chan: &T, lk: &mut Spinlock) {
    let p = myproc();

    p.lock.acquire();
    lk.release();

    p.chan = Some(chan as *const T as *const u8);
    p.state = Sleeping;

    sched();

    p.chan = None;

    p.lock.release();
    lk.acquire();
}

// Copy to either a user address, or kernel address depending on usr_dst.
pub fn either_copyout(user_dst: bool, dst: *mut u8, src: *const u8, len: usize) -> i32 {
    let p = myproc();
    if user_dst {
        let pagetable = p.pagetable.as_mut().unwrap();
        crate::vm::copyout(pagetable, dst as usize, src, len)
    } else {
        unsafe { core::ptr::copy_nonoverlapping(src, dst, len) };
        0
    }
}

// Copy from either a user address, or kernel address, depending on usr_src.
pub fn either_copyin(dst: *mut u8, user_src: bool, src: *const u8, len: usize) -> i32 {
    let p = myproc();
    if user_src {
        let pagetable = p.pagetable.as_mut().unwrap();
        crate::vm::copyin(pagetable, dst, src as usize, len)
    } else {
        unsafe { core::ptr::copy_nonoverlapping(src, dst, len) };
        0
    }
}

// Print a process listing to console, for debugging. Runs when user
// types ^P on console.
pub fn procdump() {
    crate::printf!("\n");
    for i in 0..NPROC {
        let p = unsafe { &PROCS[i] };
        if p.state == Unused {
            continue;
        }
        let state = match p.state {
            Unused => "unused",
            Used => "used",
            Sleeping => "sleep ",
            Runnable => "runble",
            Running => "run   ",
            Zombie => "zombie",
            Recovering => "recov ",
        };
        crate::printf!("{} {} {}\n", p.pid, state, core::str::from_utf8(&p.name).unwrap_or(""));
    }
}

// Kill the process with the given pid. The victim won't exit until it
// tries to return to user space (see usertrap()).
pub fn kill(pid: u32) -> i32 {
    for i in 0..NPROC {
        let p = unsafe { &mut PROCS[i] };
        p.lock.acquire();
        if p.pid == pid {
            p.set_killed(1);
            if p.state == Sleeping {
                p.state = Runnable;
            }
            p.lock.release();
            return 0;
        }
        p.lock.release();
    }
    -1
}

// Pass p's abandoned children to init. wait_lock must be held.
fn reparent(p: &mut Proc<'static>) {
    for i in 0..NPROC {
        let pp = unsafe { &mut PROCS[i] };
        if pp.parent == Some(p as *mut Proc) {
            pp.parent = unsafe { INIT_PROC };
            wakeup(unsafe { INIT_PROC.unwrap() } as *const u8);
        }
    }
}

// Exit the current process. Does not return.
// An exited process remains in the zombie state until its parent calls wait().
pub fn exit(status: i32) -> ! {
    let p = myproc();
    // Never popped by a guard: exit() does not return, so the frame
    // rides along until freeproc() clears the call stack on reuse.
    p.call_stack.push(Frame::Exit);

    // A process mid-recovery must not be torn down; the NMI shepherd
    // clears Recovering before handing back control.
    while p.state == Recovering {
        core::hint::spin_loop();
    }

    for i in 0..NOFILE {
        if let Some(f) = p.ofile[i] {
            crate::file::file::fileclose(unsafe { &mut *f });
            p.ofile[i] = None;
        }
    }

    crate::log::begin_op();
    if let Some(cwd) = p.cwd {
        unsafe { (&mut *cwd).iput() };
    }
    crate::log::end_op();
    p.cwd = None;

    unsafe { WAIT_LOCK.acquire() };

    reparent(p);

    if let Some(parent) = p.parent {
        wakeup(parent as *const u8);
    }

    p.lock.acquire();
    p.xstate = status;
    p.state = Zombie;

    unsafe { WAIT_LOCK.release() };

    sched();
    unreachable!("zombie exit");
}

// Wait for a child process to exit and return its pid.
pub fn wait(addr: usize) -> i32 {
    let p = myproc();

    unsafe { WAIT_LOCK.acquire() };

    loop {
        let mut havekids = false;
        for i in 0..NPROC {
            let np = unsafe { &mut PROCS[i] };
            if np.parent == Some(p as *mut Proc) {
                np.lock.acquire();
                havekids = true;
                if np.state == Zombie {
                    let pid = np.pid;
                    if addr != 0 {
                        let xstate = np.xstate;
                        if either_copyout(true, addr as *mut u8, &xstate as *const i32 as *const u8, mem::size_of::<i32>()) < 0 {
                            np.lock.release();
                            unsafe { WAIT_LOCK.release() };
                            return -1;
                        }
                    }
                    freeproc(np);
                    np.lock.release();
                    unsafe { WAIT_LOCK.release() };
                    return pid as i32;
                }
                np.lock.release();
            }
        }

        if !havekids || p.killed() != 0 {
            unsafe { WAIT_LOCK.release() };
            return -1;
        }

        sleep(p, unsafe { &mut WAIT_LOCK });
    }
}

/// Look up a live process by pid. Used by recovery handlers to patch
/// references (cwd, ofile) in every process that pointed at a broken
/// object, without needing a borrow of the caller's own `Proc`.
pub fn search_proc_from_pid(pid: u32) -> Option<&'static mut Proc<'static>> {
    for i in 0..NPROC {
        let p = unsafe { &mut PROCS[i] };
        if p.pid == pid && p.state != Unused {
            return Some(p);
        }
    }
    None
}

/// Iterate all live (non-Unused) processes. Recovery handlers use this
/// to patch every descriptor/cwd pointing at a replaced object; ordinary
/// kernel code has no need for it.
pub fn for_each_live_proc(mut f: impl FnMut(&mut Proc<'static>)) {
    for i in 0..NPROC {
        let p = unsafe { &mut PROCS[i] };
        if p.state != Unused {
            f(p);
        }
    }
}

extern "C" {
    fn swtch(old: *mut Context, new: *mut Context);
}

// Per-CPU process scheduler. Each CPU calls scheduler() after setting
// itself up, never returning. It looks for a runnable process, swtch()es
// to it, which eventually swtch()es back via sched() into scheduler().
pub fn scheduler() -> ! {
    let c = mycpu();
    loop {
        crate::riscv::intr_on();

        for i in 0..NPROC {
            let p = unsafe { &mut PROCS[i] };
            p.lock.acquire();
            if p.state == Runnable {
                p.state = Running;
                c.proc = Some(p as *mut Proc);
                unsafe { swtch(&mut c.context, &mut p.context) };
                c.proc = None;
            }
            p.lock.release();
        }
    }
}

// Switch to scheduler. Must hold only p->lock and have changed
// proc's state. Saves and restores intena because intena is a property
// of this kernel thread, not this CPU.
fn sched() {
    let p = myproc();
    if !p.lock.holding() {
        panic!("sched p->lock");
    }
    if p.state == Running {
        panic!("sched running");
    }
    if crate::riscv::intr_get() {
        panic!("sched interruptible");
    }

    let c = mycpu();
    let intena = c.intena;
    unsafe { swtch(&mut p.context, &mut c.context) };
    c.intena = intena;
}
