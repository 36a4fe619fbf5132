//! Exponential backoff schedule for delivery retries

use std::time::Duration;

/// Compute the backoff delay for a given attempt (0-based), capped.
///
/// attempt 0 → base, attempt 1 → base×2, attempt 2 → base×4, ...
pub fn backoff_delay(base_delay_ms: u64, attempt: u32, max_delay_ms: u64) -> Duration {
    let factor = 2_u64.saturating_pow(attempt.min(32));
    let delay = base_delay_ms.saturating_mul(factor).min(max_delay_ms);
    Duration::from_millis(delay)
}
