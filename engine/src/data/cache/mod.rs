//! Cache module
//!
//! Read-through overlay for journey and attribution lookups. The shipped
//! backend is in-memory (moka); the `CacheBackend` trait keeps the door open
//! for external backends without touching callers.

mod backend;
mod error;
mod key;
mod memory;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use backend::CacheBackend;
pub use error::CacheError;
pub use key::CacheKey;
use memory::InMemoryCache;

use crate::core::config::CacheConfig;

/// Cache service providing typed access to cache backend
///
/// Wraps the underlying cache backend and provides:
/// - Raw bytes API for flexibility
/// - Typed API using MessagePack serialization
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend.backend_name())
            .finish()
    }
}

impl CacheService {
    /// Create a new cache service with the in-memory backend
    pub fn new(config: &CacheConfig) -> Self {
        tracing::debug!(
            max_entries = config.max_entries,
            journey_ttl_secs = config.journey_ttl_secs,
            "Initializing in-memory cache"
        );
        Self {
            backend: Arc::new(InMemoryCache::new(config)),
        }
    }

    /// Create a cache service over a custom backend
    pub fn with_backend(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Get the backend name
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    // =========================================================================
    // Raw bytes API
    // =========================================================================

    /// Get raw bytes from cache
    pub async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.backend.get(key).await
    }

    /// Set raw bytes in cache
    pub async fn set_raw(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        self.backend.set(key, value, ttl).await
    }

    // =========================================================================
    // Typed API (serde)
    // =========================================================================

    /// Get a typed value from cache
    ///
    /// Uses MessagePack for compact, fast deserialization.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get_raw(key).await? {
            Some(bytes) => {
                let value = rmp_serde::from_slice(&bytes)
                    .map_err(|e| CacheError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value in cache
    ///
    /// Uses MessagePack for compact, fast serialization.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let bytes =
            rmp_serde::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set_raw(key, bytes, ttl).await
    }

    // =========================================================================
    // Other operations
    // =========================================================================

    /// Delete a key from cache
    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.backend.delete(key).await
    }

    /// Delete a key from cache with automatic error logging.
    ///
    /// This is a convenience method for cache invalidation where errors
    /// should be logged but not propagated (cache misses are acceptable).
    pub async fn invalidate_key(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Cache invalidation failed");
        }
    }

    /// Check if a key exists
    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.backend.exists(key).await
    }

    /// Invalidate keys matching a pattern
    pub async fn invalidate(&self, pattern: &str) -> Result<u64, CacheError> {
        self.backend.delete_pattern(pattern).await
    }

    /// Get TTL remaining for a key
    pub async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        self.backend.ttl(key).await
    }

    /// Health check
    pub async fn health_check(&self) -> Result<(), CacheError> {
        self.backend.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CacheConfig {
        CacheConfig {
            max_entries: 1000,
            journey_ttl_secs: 300,
        }
    }

    #[tokio::test]
    async fn test_cache_service_backend_name() {
        let service = CacheService::new(&test_config());
        assert_eq!(service.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_typed_get_set() {
        let service = CacheService::new(&test_config());

        #[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
        struct Snapshot {
            lead_id: String,
            touchpoint_count: i64,
        }

        let snapshot = Snapshot {
            lead_id: "l1".to_string(),
            touchpoint_count: 4,
        };

        service
            .set(&CacheKey::journey("l1"), &snapshot, None)
            .await
            .unwrap();
        let fetched: Option<Snapshot> = service.get(&CacheKey::journey("l1")).await.unwrap();
        assert_eq!(fetched, Some(snapshot));
    }

    #[tokio::test]
    async fn test_invalidate_lead_pattern() {
        let service = CacheService::new(&test_config());

        service.set_raw(&CacheKey::journey("l1"), b"a".to_vec(), None).await.unwrap();
        service
            .set_raw(&CacheKey::attribution("l1", "linear"), b"b".to_vec(), None)
            .await
            .unwrap();
        service.set_raw(&CacheKey::journey("l2"), b"c".to_vec(), None).await.unwrap();

        let deleted = service.invalidate(&CacheKey::lead_pattern("l1")).await.unwrap();
        assert_eq!(deleted, 2);

        assert!(!service.exists(&CacheKey::journey("l1")).await.unwrap());
        assert!(service.exists(&CacheKey::journey("l2")).await.unwrap());
    }

    #[tokio::test]
    async fn test_health_check() {
        let service = CacheService::new(&test_config());
        assert!(service.health_check().await.is_ok());
    }
}
