//! Memory-error recovery subsystem.
//!
//! On an uncorrectable memory error (UE) delivered as an NMI, control
//! passes through [`nmi::nmi_handle`], which serializes concurrent
//! victims (`nmi`), looks the faulting address up in the object registry
//! (`mlist`), acquires the class's recovery lock (`rcs`), runs the
//! class-specific handler (`handlers`), and finally lets
//! `after_treatment` decide how the interrupted activity resumes.

pub mod after_treatment;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod mlist;
pub mod nmi;
pub mod ptdup;
pub mod rcs;
pub mod stackwalk;
pub mod tracker;
pub mod trans;
pub mod usercoop;

pub use error::RecoveryError;

/// Runtime-mutable recovery mode, toggled by `change_recovery_mode`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RecoveryMode {
    Conservative,
    Aggressive,
}

static MODE: core::sync::atomic::AtomicU8 = core::sync::atomic::AtomicU8::new(0);

pub fn recovery_mode() -> RecoveryMode {
    if MODE.load(core::sync::atomic::Ordering::Relaxed) == 0 {
        RecoveryMode::Conservative
    } else {
        RecoveryMode::Aggressive
    }
}

pub fn set_recovery_mode(mode: RecoveryMode) {
    let v = match mode {
        RecoveryMode::Conservative => 0,
        RecoveryMode::Aggressive => 1,
    };
    MODE.store(v, core::sync::atomic::Ordering::Relaxed);
}

/// Global on/off switch for the user-cooperation protocol (C8). When
/// disabled, broken descriptors are dropped rather than marked RESERVED
/// and a broken syscall simply fails, matching the non-cooperative mode
/// described for plain `open`/`read`/`write`.
static USER_COOP: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(false);

pub fn user_coop_enabled() -> bool {
    USER_COOP.load(core::sync::atomic::Ordering::Relaxed)
}

pub fn set_user_coop(enabled: bool) {
    USER_COOP.store(enabled, core::sync::atomic::Ordering::Relaxed);
}

/// One-time setup for every registry/log/queue the subsystem owns.
/// Called once from `kmain` after the ordinary kernel singletons
/// (`kmem`, `bcache`, `ftable`, `icache`, `log`) have been initialized.
pub fn recovery_init() {
    mlist::mlist_init();
    rcs::rcs_init();
    nmi::nmi_init();
    logging::logging_init();
}
