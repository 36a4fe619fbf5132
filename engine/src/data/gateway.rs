//! Storage gateway: persistence plus cache overlay
//!
//! Domain services go through the gateway instead of holding the store and
//! cache separately. Reads are read-through with best-effort caching (a cache
//! failure degrades to a store read, never an error); mutations invalidate the
//! lead's cached entries after the write commits.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::data::cache::{CacheKey, CacheService};
use crate::data::sqlite::SqliteError;
use crate::data::traits::JourneyStore;
use crate::data::types::{JourneyRow, LeadRow, SessionRow, TouchpointRow};

pub struct StorageGateway {
    store: Arc<dyn JourneyStore>,
    cache: CacheService,
    journey_ttl: Duration,
}

impl StorageGateway {
    pub fn new(store: Arc<dyn JourneyStore>, cache: CacheService, journey_ttl: Duration) -> Self {
        Self {
            store,
            cache,
            journey_ttl,
        }
    }

    /// Direct access to the underlying store (uncached paths: sync audit log,
    /// ordinal allocation, batch operations).
    pub fn store(&self) -> &Arc<dyn JourneyStore> {
        &self.store
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    // =========================================================================
    // Cached reads
    // =========================================================================

    /// Read-through cache wrapper: serve from cache when present, otherwise
    /// run the loader and cache its result.
    ///
    /// Cache failures on either side degrade to the loader with a warning;
    /// `None` results are not negatively cached.
    pub async fn get_with_cache<T, F, Fut>(
        &self,
        key: &str,
        loader: F,
    ) -> Result<Option<T>, SqliteError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, SqliteError>>,
    {
        match self.cache.get::<T>(key).await {
            Ok(Some(value)) => {
                tracing::trace!(key = %key, "Cache hit");
                return Ok(Some(value));
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "Cache get error"),
            Ok(None) => {}
        }

        let value = loader().await?;
        if let Some(value) = &value
            && let Err(e) = self.cache.set(key, value, Some(self.journey_ttl)).await
        {
            tracing::warn!(key = %key, error = %e, "Cache set error");
        }
        Ok(value)
    }

    /// Get a lead, cache-first
    pub async fn get_lead(&self, id: &str) -> Result<Option<LeadRow>, SqliteError> {
        self.get_with_cache(&CacheKey::lead(id), || self.store.get_lead(id))
            .await
    }

    /// Ordered touchpoints for a lead, cache-first
    pub async fn list_touchpoints(
        &self,
        lead_id: &str,
    ) -> Result<Vec<TouchpointRow>, SqliteError> {
        let rows = self
            .get_with_cache(&CacheKey::touchpoints_for_lead(lead_id), || async {
                self.store.list_touchpoints_for_lead(lead_id).await.map(Some)
            })
            .await?;
        Ok(rows.unwrap_or_default())
    }

    /// Sessions for a lead, cache-first
    pub async fn list_sessions(&self, lead_id: &str) -> Result<Vec<SessionRow>, SqliteError> {
        let rows = self
            .get_with_cache(&CacheKey::sessions_for_lead(lead_id), || async {
                self.store.list_sessions_for_lead(lead_id).await.map(Some)
            })
            .await?;
        Ok(rows.unwrap_or_default())
    }

    /// Latest materialized journey for a lead, cache-first
    pub async fn latest_journey(&self, lead_id: &str) -> Result<Option<JourneyRow>, SqliteError> {
        self.get_with_cache(&CacheKey::journey(lead_id), || {
            self.store.latest_journey(lead_id)
        })
        .await
    }

    // =========================================================================
    // Mutations (invalidate after successful write)
    // =========================================================================

    pub async fn create_lead(&self, lead: &LeadRow) -> Result<(), SqliteError> {
        self.store.create_lead(lead).await?;
        self.invalidate_lead(&lead.id).await;
        Ok(())
    }

    pub async fn create_session(&self, session: &SessionRow) -> Result<(), SqliteError> {
        self.store.create_session(session).await?;
        self.invalidate_lead(&session.lead_id).await;
        Ok(())
    }

    pub async fn touch_session(
        &self,
        lead_id: &str,
        session_id: &str,
        touched_at: i64,
    ) -> Result<bool, SqliteError> {
        let updated = self.store.touch_session(session_id, touched_at).await?;
        if updated {
            self.invalidate_lead(lead_id).await;
        }
        Ok(updated)
    }

    pub async fn insert_touchpoint(&self, touchpoint: &TouchpointRow) -> Result<(), SqliteError> {
        self.store.insert_touchpoint(touchpoint).await?;
        self.invalidate_lead(&touchpoint.lead_id).await;
        Ok(())
    }

    pub async fn save_journey(&self, journey: &JourneyRow) -> Result<(), SqliteError> {
        self.store.save_journey(journey).await?;
        self.invalidate_lead(&journey.lead_id).await;
        Ok(())
    }

    /// Drop every cached entry scoped to a lead.
    ///
    /// Best-effort: invalidation failures are logged, not propagated, since
    /// entries expire by TTL anyway.
    pub async fn invalidate_lead(&self, lead_id: &str) {
        if let Err(e) = self.cache.invalidate(&CacheKey::lead_pattern(lead_id)).await {
            tracing::warn!(lead_id = %lead_id, error = %e, "Lead cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use crate::data::sqlite::SqliteService;

    async fn setup_gateway() -> StorageGateway {
        let store = Arc::new(SqliteService::init_in_memory().await.unwrap());
        let cache = CacheService::new(&CacheConfig {
            max_entries: 100,
            journey_ttl_secs: 300,
        });
        StorageGateway::new(store, cache, Duration::from_secs(300))
    }

    fn make_lead(id: &str) -> LeadRow {
        LeadRow {
            id: id.to_string(),
            email: Some("a@b.test".to_string()),
            external_ref: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn test_read_through_populates_cache() {
        let gateway = setup_gateway().await;
        gateway.create_lead(&make_lead("lead-1")).await.unwrap();

        // First read hits the store and populates the cache
        assert!(gateway.get_lead("lead-1").await.unwrap().is_some());
        assert!(
            gateway
                .cache()
                .exists(&CacheKey::lead("lead-1"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_mutation_invalidates_lead_entries() {
        let gateway = setup_gateway().await;
        gateway.create_lead(&make_lead("lead-1")).await.unwrap();

        // Warm the cache
        gateway.get_lead("lead-1").await.unwrap();
        gateway.list_touchpoints("lead-1").await.unwrap();

        let session = SessionRow {
            id: "sess-1".to_string(),
            lead_id: "lead-1".to_string(),
            first_touch_at: 1000,
            last_touch_at: 1000,
            attribution_model: None,
            source: None,
            medium: None,
            campaign: None,
            created_at: 1000,
            updated_at: 1000,
        };
        gateway.create_session(&session).await.unwrap();

        assert!(
            !gateway
                .cache()
                .exists(&CacheKey::lead("lead-1"))
                .await
                .unwrap()
        );
        assert!(
            !gateway
                .cache()
                .exists(&CacheKey::touchpoints_for_lead("lead-1"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_get_with_cache_skips_loader_on_hit() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let gateway = setup_gateway().await;
        let loads = AtomicU32::new(0);

        for _ in 0..3 {
            let hit: Option<String> = gateway
                .get_with_cache("v1:lead:l1:record", || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(Some("value".to_string()))
                })
                .await
                .unwrap();
            assert_eq!(hit.as_deref(), Some("value"));
        }

        // First read loads and caches; the rest are served from cache
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_with_cache_does_not_cache_none() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let gateway = setup_gateway().await;
        let loads = AtomicU32::new(0);

        for _ in 0..2 {
            let miss: Option<String> = gateway
                .get_with_cache("v1:lead:l1:absent", || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .await
                .unwrap();
            assert!(miss.is_none());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_miss_returns_none_without_caching() {
        let gateway = setup_gateway().await;
        assert!(gateway.get_lead("ghost").await.unwrap().is_none());
        assert!(!gateway.cache().exists(&CacheKey::lead("ghost")).await.unwrap());
    }
}
