/*!
 * System Limits and Constants
 *
 * Centralized location for ring sizes, table sizes and I/O bounds.
 * Organized by domain for discoverability.
 *
 * - Performance-critical constants are marked with [PERF]
 * - Linux-compatible values are marked with [LINUX-COMPAT]
 */

use std::time::Duration;

// =============================================================================
// IO_URING SIZING
// =============================================================================

/// io_uring submission queue size
/// Exactly one entry is in flight at a time, so a small ring suffices
/// [PERF] Must be power of 2; the kernel rounds up otherwise
pub const DEFAULT_SQ_SIZE: u32 = 8;

/// Upper bound accepted for a configured submission queue depth
/// [LINUX-COMPAT] IORING_MAX_ENTRIES
pub const MAX_SQ_SIZE: u32 = 32_768;

/// Slots in the sparse registered file table
pub const DEFAULT_FILE_TABLE_SIZE: u32 = 10;

/// Upper bound accepted for a configured file table
/// [LINUX-COMPAT] IORING_MAX_FIXED_FILES
pub const MAX_FILE_TABLE_SIZE: u32 = 1 << 20;

// =============================================================================
// I/O BOUNDS
// =============================================================================

/// Largest single read/write transfer
/// [LINUX-COMPAT] MAX_RW_COUNT; keeps byte counts representable in an i32 status
pub const MAX_IO_LEN: usize = 0x7fff_f000;

/// io_uring offset meaning "use and advance the file position"
pub const CURRENT_POSITION: u64 = u64::MAX;

// =============================================================================
// MONITORING
// =============================================================================

/// Single operations slower than this are logged as warnings
pub const SLOW_DISPATCH_THRESHOLD: Duration = Duration::from_millis(10);

/// Scenarios slower than this are logged as warnings
pub const SLOW_SCENARIO_THRESHOLD: Duration = Duration::from_secs(1);

// =============================================================================
// SCENARIOS
// =============================================================================

/// Bytes requested by the read scenario
pub const SCENARIO_READ_SIZE: usize = 1024;

/// Default directory scenario files are created under
pub const DEFAULT_SCENARIO_ROOT: &str = "/tmp";

/// File every read-only scenario opens
pub const SCENARIO_SOURCE_FILE: &str = "/etc/passwd";

/// Payload written by the connect scenario
pub const CONNECT_PAYLOAD: &[u8] = b"Hello, world!\n";
