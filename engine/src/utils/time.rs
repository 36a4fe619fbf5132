//! Time utility functions

use chrono::{DateTime, Utc};

/// Convert milliseconds since Unix epoch to DateTime<Utc>
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(|| {
        tracing::warn!(millis, "Invalid timestamp, using epoch");
        DateTime::UNIX_EPOCH
    })
}

/// Truncate a timestamp to a bucket boundary.
///
/// Used for near-duplicate touchpoint collapsing: two events whose timestamps
/// fall into the same bucket are candidates for deduplication.
pub fn truncate_to_bucket(ts: DateTime<Utc>, bucket_secs: u64) -> i64 {
    let bucket_ms = (bucket_secs.max(1) * 1000) as i64;
    let millis = ts.timestamp_millis();
    millis.div_euclid(bucket_ms) * bucket_ms
}
