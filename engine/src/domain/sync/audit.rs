//! Sync audit log: the dispatcher's source of truth
//!
//! Every dispatch attempt leaves exactly one row. A failed audit write is
//! fatal for the attempt: without the row the delivery outcome is unknowable,
//! so the error propagates instead of being swallowed.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::core::EngineError;
use crate::data::traits::JourneyStore;
use crate::data::types::{SyncAttemptRow, SyncOutcome};

pub struct SyncAuditLog {
    store: Arc<dyn JourneyStore>,
}

impl SyncAuditLog {
    pub fn new(store: Arc<dyn JourneyStore>) -> Self {
        Self { store }
    }

    /// Append one attempt record. Retries append new rows under the same
    /// idempotency key; nothing is ever updated in place.
    pub async fn append(
        &self,
        lead_id: &str,
        destination: &str,
        idempotency_key: &str,
        attempt: u32,
        outcome: SyncOutcome,
        http_status: Option<i64>,
        request_snapshot: String,
        response_snapshot: Option<String>,
    ) -> Result<SyncAttemptRow, EngineError> {
        let record = SyncAttemptRow {
            id: Uuid::new_v4().to_string(),
            lead_id: lead_id.to_string(),
            destination: destination.to_string(),
            idempotency_key: idempotency_key.to_string(),
            attempt: attempt as i64,
            outcome: outcome.as_str().to_string(),
            http_status,
            request_snapshot,
            response_snapshot,
            created_at: Utc::now().timestamp_millis(),
        };

        self.store
            .append_sync_attempt(&record)
            .await
            .map_err(|e| EngineError::AuditWrite {
                idempotency_key: idempotency_key.to_string(),
                detail: e.to_string(),
            })?;

        tracing::info!(
            lead_id = %lead_id,
            destination = %destination,
            attempt,
            outcome = %outcome,
            http_status = ?http_status,
            "Recorded sync attempt"
        );

        Ok(record)
    }

    /// Earliest successful attempt for an idempotency key, if any.
    pub async fn find_prior_success(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<SyncAttemptRow>, EngineError> {
        Ok(self.store.find_prior_success(idempotency_key).await?)
    }

    /// Full attempt history for operator reconciliation, oldest first.
    pub async fn history(
        &self,
        lead_id: &str,
        destination: &str,
    ) -> Result<Vec<SyncAttemptRow>, EngineError> {
        Ok(self.store.sync_history(lead_id, destination).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::SqliteService;

    async fn setup() -> SyncAuditLog {
        let store: Arc<dyn JourneyStore> =
            Arc::new(SqliteService::init_in_memory().await.unwrap());
        SyncAuditLog::new(store)
    }

    #[tokio::test]
    async fn test_append_then_find_success() {
        let audit = setup().await;

        audit
            .append("lead-1", "meta", "key-1", 1, SyncOutcome::Failed, Some(503), "{}".into(), None)
            .await
            .unwrap();
        assert!(audit.find_prior_success("key-1").await.unwrap().is_none());

        audit
            .append("lead-1", "meta", "key-1", 2, SyncOutcome::Success, Some(200), "{}".into(), None)
            .await
            .unwrap();
        let hit = audit.find_prior_success("key-1").await.unwrap().unwrap();
        assert_eq!(hit.attempt, 2);
    }

    #[tokio::test]
    async fn test_history_in_order() {
        let audit = setup().await;

        for attempt in 1..=3 {
            audit
                .append(
                    "lead-1",
                    "meta",
                    "key-1",
                    attempt,
                    SyncOutcome::Failed,
                    Some(500),
                    "{}".into(),
                    None,
                )
                .await
                .unwrap();
        }

        let history = audit.history("lead-1", "meta").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].attempt, 1);
        assert_eq!(history[2].attempt, 3);
    }
}
