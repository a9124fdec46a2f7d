// linetail - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Reading
// =============================================================================

/// Read chunk size in bytes for streaming file reads.
pub const READ_CHUNK_SIZE: usize = 64 * 1024; // 64 KB

// =============================================================================
// Change detection
// =============================================================================

/// Default polling interval in milliseconds for the stat-based change source.
/// Overridable per engine through `Config::poll_interval_ms` (tests use a few
/// milliseconds for fast turnaround).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// How often blocking waits wake to check the cancellation flag (ms).
/// Every sleep in the crate is sliced at this granularity so a stop request
/// is honoured promptly.
pub const CANCEL_CHECK_INTERVAL_MS: u64 = 10;

/// How often the kernel-event change source re-stats the watched path even
/// when no events arrive (ms). Truncation-in-place does not always surface
/// as a distinct kernel event, so the event source keeps a slow stat tick
/// as a safety net.
pub const SELF_STAT_INTERVAL_MS: u64 = 500;

// =============================================================================
// Output sequence
// =============================================================================

/// Capacity of the bounded record channel between the follow worker and the
/// consumer. Must stay at 1: `tell()` promises an offset that leads the last
/// consumed record by at most one in-flight record, which bounds how far the
/// worker may read ahead of the consumer.
pub const LINES_CHANNEL_CAPACITY: usize = 1;

/// Retry interval in milliseconds while the record channel is full (ms).
pub const SEND_RETRY_INTERVAL_MS: u64 = 10;

// =============================================================================
// Rate limiting
// =============================================================================

/// Text of the synthetic record emitted when the rate limiter rejects a pour.
pub const RATE_LIMIT_NOTICE: &str =
    "Too much log activity; waiting a second before resuming tailing";
