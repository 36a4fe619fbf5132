//! Type-safe cache key builder with versioning

use crate::core::constants::CACHE_KEY_VERSION;

/// Type-safe cache key builder
///
/// All keys are prefixed with a version (e.g., "v1:") to allow
/// invalidating all cached data on schema changes. Lead-scoped keys share
/// the `v1:lead:{id}:` prefix so one pattern delete clears a lead's entries.
pub struct CacheKey;

impl CacheKey {
    /// Cache key for a lead record
    pub fn lead(id: &str) -> String {
        format!("{}:lead:{}:record", CACHE_KEY_VERSION, id)
    }

    /// Cache key for the session list of a lead
    pub fn sessions_for_lead(lead_id: &str) -> String {
        format!("{}:lead:{}:sessions", CACHE_KEY_VERSION, lead_id)
    }

    /// Cache key for the ordered touchpoint list of a lead
    pub fn touchpoints_for_lead(lead_id: &str) -> String {
        format!("{}:lead:{}:touchpoints", CACHE_KEY_VERSION, lead_id)
    }

    /// Cache key for the assembled journey of a lead
    pub fn journey(lead_id: &str) -> String {
        format!("{}:lead:{}:journey", CACHE_KEY_VERSION, lead_id)
    }

    /// Cache key for an attribution result (lead + model)
    pub fn attribution(lead_id: &str, model: &str) -> String {
        format!("{}:lead:{}:attribution:{}", CACHE_KEY_VERSION, lead_id, model)
    }

    /// Glob pattern matching every cached entry scoped to a lead
    pub fn lead_pattern(lead_id: &str) -> String {
        format!("{}:lead:{}:*", CACHE_KEY_VERSION, lead_id)
    }
}
