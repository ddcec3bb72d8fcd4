//! Tunables for the recovery subsystem, collected the way `param.rs`
//! collects the rest of the kernel's compile-time knobs.

/// Maximum number of outstanding NMI-queue entries (the first victim
/// plus its followers) before the shepherd fail-stops rather than drop
/// a victim silently.
pub const NMI_QUEUE_SIZE: usize = 8;

/// Depth of a process's R.C.S. entry history (§3: "ordered list of up
/// to 5 class flags").
pub const RCS_INFO_HISTORY_SIZE: usize = 5;

/// Maximum number of stack frames a fail-stop gate inspects when
/// deciding which procedure was interrupted.
pub const DEPTH: usize = 30;

/// Size of the recovered-address dedup cache.
pub const RECOVERED_CACHE_SIZE: usize = DEPTH;

/// Number of `usize`-sized slots per M-List registry page, with the
/// last slot reserved for the next-page link.
pub const MLIST_PAGE_SLOTS: usize = 32;

/// Maximum PTDS/PTED list length the original keeps per L0 region
/// before it must allocate a fresh node (one L0 table has 512 PTEs, so
/// 511 is the worst case: every entry its own one-page PTED).
pub const PTDUP_MAX_RUN: usize = 511;

/// Practical per-L0-region segment-list capacity for the fixed-size
/// Rust translation. Real workloads duplicate a handful of contiguous
/// runs per region, not hundreds of singleton entries; this trades the
/// original's unbounded-but-rare worst case for a static bound, the
/// same tradeoff the object registry (`mlist`) makes.
pub const PTDUP_SEGMENTS_PER_L0: usize = 8;

/// Number of L1-mirror slots tracked per process (matches one Sv39 L2
/// table's 512 entries) and, nested inside each, the number of L0
/// mirror slots (matches one L1 table's 512 entries). Both levels are
/// capped well below 512 since real address spaces only populate a
/// handful of top-level page-table entries; `recover_L2`/`recover_L1`
/// fail-stop if a process legitimately exceeds this (documented as an
/// accepted Open Question resolution).
pub const PTDUP_L2_SLOTS: usize = 16;
pub const PTDUP_L1_SLOTS: usize = 16;
