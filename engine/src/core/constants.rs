//! Engine-wide constants and configuration defaults

// =============================================================================
// Cache
// =============================================================================

/// Cache key version prefix. Bump to invalidate all cached data on schema changes.
pub const CACHE_KEY_VERSION: &str = "v1";

/// Default maximum cache entries
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 10_000;

/// Default TTL for cached journeys and attribution results (seconds)
pub const DEFAULT_JOURNEY_CACHE_TTL_SECS: u64 = 300;

// =============================================================================
// Touchpoint recording
// =============================================================================

/// Tolerated forward clock skew for `occurred_at` (seconds).
/// Events further in the future are rejected as invalid.
pub const DEFAULT_CLOCK_SKEW_TOLERANCE_SECS: u64 = 300;

/// Default dedup bucket width for near-duplicate touchpoints (seconds)
pub const DEFAULT_DEDUP_BUCKET_SECS: u64 = 1;

// =============================================================================
// Attribution
// =============================================================================

/// Default half-life for the time-decay model (days)
pub const DEFAULT_TIME_DECAY_HALF_LIFE_DAYS: f64 = 7.0;

/// Default position-based split: first touchpoint share
pub const DEFAULT_POSITION_FIRST_WEIGHT: f64 = 0.4;

/// Default position-based split: last touchpoint share
pub const DEFAULT_POSITION_LAST_WEIGHT: f64 = 0.4;

/// Tolerance when asserting that credit fractions sum to 1.0
pub const CREDIT_SUM_TOLERANCE: f64 = 1e-9;

// =============================================================================
// Conversion sync
// =============================================================================

/// Default maximum delivery attempts per (lead, destination) pair
pub const DEFAULT_SYNC_MAX_ATTEMPTS: u32 = 5;

/// Default base delay for delivery retry backoff (milliseconds)
pub const DEFAULT_SYNC_BASE_DELAY_MS: u64 = 500;

/// Default cap on delivery retry backoff (milliseconds)
pub const DEFAULT_SYNC_MAX_DELAY_MS: u64 = 60_000;

/// Default timeout for a single outbound delivery call (seconds)
pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 30;

/// Default number of sync workers draining the dispatch queue
pub const DEFAULT_SYNC_WORKERS: usize = 4;

/// Default capacity of the dispatch queue
pub const DEFAULT_SYNC_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// SQLite
// =============================================================================

/// SQLite busy timeout (seconds)
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 5;

/// SQLite page cache size (negative = KiB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// Maximum pooled SQLite connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 8;
