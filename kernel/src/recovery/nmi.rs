//! NMI Shepherd & Queue (C5): serializes concurrent UE victims across
//! CPUs to a single active recovery at a time. The first victim to
//! arrive becomes the shepherd and drains the queue (itself, then every
//! follower that arrived while it worked) in arrival order; followers
//! just park until their slot carries a verdict.

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::recovery::after_treatment::Termination;
use crate::recovery::config::NMI_QUEUE_SIZE;
use crate::recovery::error::{RecoveryError, RecoveryResult};
use crate::recovery::tracker;
use crate::spinlock::Spinlock;

/// Global recovery-in-progress state. `Panic` is a one-way escalation:
/// once entered the kernel only ever panics out of further NMIs, which
/// is the `nmi_handle` fail-stop path rather than a value this module
/// recovers from.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
enum HandlerState {
    Idle = 0,
    First = 1,
    Follow = 2,
    Panic = 3,
}

static STATE: AtomicU8 = AtomicU8::new(HandlerState::Idle as u8);

fn load_state() -> HandlerState {
    match STATE.load(Ordering::Acquire) {
        1 => HandlerState::First,
        2 => HandlerState::Follow,
        3 => HandlerState::Panic,
        _ => HandlerState::Idle,
    }
}

/// Per-hart reentrancy guard: an NMI landing while *this* hart is
/// already inside `nmi_handle` is the "NMI during NMI" case that
/// escalates to panic rather than a second victim joining the queue.
static IN_NMI: [AtomicBool; crate::param::NCPU] = [
    AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false),
    AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false), AtomicBool::new(false),
];

#[derive(Copy, Clone)]
struct QueueEntry {
    used: bool,
    broken: usize,
    pid: u32,
    sp: u64,
    s0: u64,
    verdict: Option<Termination>,
}

const EMPTY_ENTRY: QueueEntry = QueueEntry {
    used: false,
    broken: 0,
    pid: 0,
    sp: 0,
    s0: 0,
    verdict: None,
};

struct NmiQueue {
    lock: Spinlock,
    entries: [QueueEntry; NMI_QUEUE_SIZE],
    len: usize,
}

static mut QUEUE: NmiQueue = NmiQueue {
    lock: Spinlock::init_lock("nmi_queue"),
    entries: [EMPTY_ENTRY; NMI_QUEUE_SIZE],
    len: 0,
};

pub fn nmi_init() {}

fn enqueue(broken: usize, pid: u32, sp: u64, s0: u64) -> RecoveryResult<usize> {
    unsafe {
        QUEUE.lock.acquire();
        if QUEUE.len >= NMI_QUEUE_SIZE {
            QUEUE.lock.release();
            return Err(RecoveryError::QueueFull);
        }
        let idx = QUEUE.len;
        QUEUE.entries[idx] = QueueEntry { used: true, broken, pid, sp, s0, verdict: None };
        QUEUE.len += 1;
        QUEUE.lock.release();
        Ok(idx)
    }
}

fn set_verdict(idx: usize, t: Termination) {
    unsafe {
        QUEUE.lock.acquire();
        QUEUE.entries[idx].verdict = Some(t);
        QUEUE.lock.release();
    }
}

fn poll_verdict(idx: usize) -> Option<Termination> {
    unsafe {
        QUEUE.lock.acquire();
        let v = QUEUE.entries[idx].verdict;
        QUEUE.lock.release();
        v
    }
}

fn reset_queue() {
    unsafe {
        QUEUE.lock.acquire();
        QUEUE.entries = [EMPTY_ENTRY; NMI_QUEUE_SIZE];
        QUEUE.len = 0;
        QUEUE.lock.release();
    }
}

fn queue_len() -> usize {
    unsafe {
        QUEUE.lock.acquire();
        let n = QUEUE.len;
        QUEUE.lock.release();
        n
    }
}

fn entry_at(idx: usize) -> (usize, u32) {
    unsafe {
        QUEUE.lock.acquire();
        let e = QUEUE.entries[idx];
        QUEUE.lock.release();
        (e.broken, e.pid)
    }
}

/// Entry point the NMI vector calls with the faulting address. Returns
/// the after-treatment verdict for *this* process's fault, for the trap
/// path to apply.
pub fn nmi_handle(addr: usize) -> Termination {
    let hart = crate::proc::cpuid();
    if IN_NMI[hart].swap(true, Ordering::AcqRel) {
        STATE.store(HandlerState::Panic as u8, Ordering::Release);
        panic!("nmi: nested NMI on same hart, escalating to fail-stop");
    }

    let p = crate::proc::myproc();
    p.lock.acquire();
    p.state = crate::proc::Procstate::Recovering;
    p.lock.release();

    let sp = p.context.sp;
    let s0 = p.context.s0;
    let pid = p.pid;

    let cas = STATE.compare_exchange(
        HandlerState::Idle as u8,
        HandlerState::First as u8,
        Ordering::AcqRel,
        Ordering::Acquire,
    );

    let verdict = if cas.is_ok() {
        // We are the shepherd: enqueue ourselves at slot 0 and drain
        // the queue (ourselves first, then whoever joins as we work,
        // in arrival order) until it is empty.
        let my_idx = enqueue(addr, pid, sp, s0).unwrap_or(0);
        let mut processed = 0;
        let mut my_verdict = None;
        loop {
            let n = queue_len();
            if processed >= n {
                break;
            }
            let (broken, _entry_pid) = entry_at(processed);
            let t = tracker::dispatch(broken);
            set_verdict(processed, t);
            if processed == my_idx {
                my_verdict = Some(t);
            }
            processed += 1;
        }
        STATE.store(HandlerState::Idle as u8, Ordering::Release);
        reset_queue();
        my_verdict.unwrap_or(Termination::FailStop)
    } else if load_state() == HandlerState::Panic {
        panic!("nmi: recovery already escalated to fail-stop");
    } else {
        let _ = STATE.compare_exchange(
            HandlerState::First as u8,
            HandlerState::Follow as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        match enqueue(addr, pid, sp, s0) {
            Ok(idx) => loop {
                if let Some(t) = poll_verdict(idx) {
                    break t;
                }
                core::hint::spin_loop();
            },
            Err(_) => Termination::FailStop,
        }
    };

    IN_NMI[hart].store(false, Ordering::Release);
    verdict
}
