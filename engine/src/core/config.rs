//! Engine configuration model
//!
//! All sections deserialize from TOML with per-field defaults, so a host
//! application can supply a partial config (or none at all) and get sane
//! behavior. Defaults live in `core::constants`.

use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CLOCK_SKEW_TOLERANCE_SECS, DEFAULT_DEDUP_BUCKET_SECS,
    DEFAULT_DISPATCH_TIMEOUT_SECS, DEFAULT_JOURNEY_CACHE_TTL_SECS, DEFAULT_POSITION_FIRST_WEIGHT,
    DEFAULT_POSITION_LAST_WEIGHT, DEFAULT_SYNC_BASE_DELAY_MS, DEFAULT_SYNC_MAX_ATTEMPTS,
    DEFAULT_SYNC_MAX_DELAY_MS, DEFAULT_SYNC_QUEUE_CAPACITY, DEFAULT_SYNC_WORKERS,
    DEFAULT_TIME_DECAY_HALF_LIFE_DAYS,
};
use super::error::EngineError;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub recorder: RecorderConfig,
    pub attribution: AttributionConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
}

impl EngineConfig {
    /// Parse a config from a TOML string, validating ranges.
    pub fn from_toml(s: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), EngineError> {
        let a = &self.attribution;
        if a.time_decay_half_life_days <= 0.0 {
            return Err(EngineError::Config(
                "attribution.time_decay_half_life_days must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&a.position_first_weight)
            || !(0.0..=1.0).contains(&a.position_last_weight)
            || a.position_first_weight + a.position_last_weight > 1.0
        {
            return Err(EngineError::Config(
                "position-based weights must be in [0,1] and sum to at most 1.0".into(),
            ));
        }
        if self.sync.max_attempts == 0 {
            return Err(EngineError::Config("sync.max_attempts must be at least 1".into()));
        }
        if self.sync.workers == 0 {
            return Err(EngineError::Config("sync.workers must be at least 1".into()));
        }
        Ok(())
    }
}

/// Touchpoint recorder settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Tolerated forward clock skew for backfilled/client-supplied timestamps (seconds)
    pub clock_skew_tolerance_secs: u64,
    /// Bucket width used to collapse near-duplicate touchpoints (seconds)
    pub dedup_bucket_secs: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            clock_skew_tolerance_secs: DEFAULT_CLOCK_SKEW_TOLERANCE_SECS,
            dedup_bucket_secs: DEFAULT_DEDUP_BUCKET_SECS,
        }
    }
}

/// Attribution model settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// Half-life for the time-decay model (days)
    pub time_decay_half_life_days: f64,
    /// Position-based model: share assigned to the first touchpoint
    pub position_first_weight: f64,
    /// Position-based model: share assigned to the last touchpoint
    pub position_last_weight: f64,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            time_decay_half_life_days: DEFAULT_TIME_DECAY_HALF_LIFE_DAYS,
            position_first_weight: DEFAULT_POSITION_FIRST_WEIGHT,
            position_last_weight: DEFAULT_POSITION_LAST_WEIGHT,
        }
    }
}

/// Conversion sync settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum delivery attempts before a pair is marked failed_permanent
    pub max_attempts: u32,
    /// Base delay for retry backoff (milliseconds)
    pub base_delay_ms: u64,
    /// Cap on retry backoff (milliseconds)
    pub max_delay_ms: u64,
    /// Timeout for one outbound delivery call (seconds)
    pub dispatch_timeout_secs: u64,
    /// Number of workers draining the dispatch queue
    pub workers: usize,
    /// Dispatch queue capacity
    pub queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_SYNC_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_SYNC_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_SYNC_MAX_DELAY_MS,
            dispatch_timeout_secs: DEFAULT_DISPATCH_TIMEOUT_SECS,
            workers: DEFAULT_SYNC_WORKERS,
            queue_capacity: DEFAULT_SYNC_QUEUE_CAPACITY,
        }
    }
}

/// Cache overlay settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries before eviction
    pub max_entries: u64,
    /// TTL for cached journeys and attribution results (seconds)
    pub journey_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            journey_ttl_secs: DEFAULT_JOURNEY_CACHE_TTL_SECS,
        }
    }
}
