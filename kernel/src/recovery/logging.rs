//! Thin bridge between the recovery subsystem's instrumentation calls
//! and the `log` crate, backed by the existing boot console. Installed
//! once at boot so that `log::info!`/`log::trace!` call sites render on
//! the same console `printf!` already writes to.

use core::fmt::Write;
use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::console::console;
use crate::spinlock::Spinlock;

struct ConsoleLogger {
    lock: Spinlock,
}

static LOGGER: ConsoleLogger = ConsoleLogger {
    lock: Spinlock::init_lock("logger"),
};

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // `Spinlock` isn't `Sync`-safe to share via `&'static` in the
        // general case, but the console itself already serializes
        // writers with its own lock, so we only need to avoid
        // interleaving the level prefix with the message.
        unsafe {
            let cons = console();
            let _ = write!(cons, "[{}] ", record.level());
            let _ = write!(cons, "{}\n", record.args());
        }
    }

    fn flush(&self) {}
}

pub fn logging_init() {
    // `set_logger` requires a `'static` reference and can only be called
    // once; recovery_init() is only ever called once from kmain().
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LevelFilter::Trace);
}

/// "start <class> recovery: <ticks>" / "end <class> recovery: <ticks>"
/// instrumentation points named in the external interface contract.
pub fn trace_recovery_start(class: &str, ticks: u64) {
    log::info!("start {} recovery: {}", class, ticks);
}

pub fn trace_recovery_end(class: &str, ticks: u64) {
    log::info!("end {} recovery: {}", class, ticks);
}

pub fn trace_all_done(ticks: u64) {
    log::info!("end all recovery operations: {}", ticks);
}

/// Monotonic counter standing in for the timer-interrupt tick count the
/// instrumentation points are named after; this port's clock interrupt
/// isn't wired up yet, so each call marks one more recovery event.
static TICK: core::sync::atomic::AtomicU64 = core::sync::atomic::AtomicU64::new(0);

pub fn tick() -> u64 {
    TICK.fetch_add(1, core::sync::atomic::Ordering::Relaxed)
}
