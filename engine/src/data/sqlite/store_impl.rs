//! JourneyStore trait implementation for SQLite
//!
//! Thin delegation to the repository modules, giving the domain layer one
//! backend-agnostic handle.

use async_trait::async_trait;

use super::SqliteService;
use super::error::SqliteError;
use super::repositories::{journey, lead, session, sync_log, touchpoint};
use crate::data::traits::{BatchOutcome, JourneyStore, SessionTouch};
use crate::data::types::{JourneyRow, LeadRow, SessionRow, SyncAttemptRow, TouchpointRow};

#[async_trait]
impl JourneyStore for SqliteService {
    // ==================== Leads ====================

    async fn create_lead(&self, row: &LeadRow) -> Result<(), SqliteError> {
        lead::create_lead(self.pool(), row).await
    }

    async fn get_lead(&self, id: &str) -> Result<Option<LeadRow>, SqliteError> {
        lead::get_lead(self.pool(), id).await
    }

    async fn update_lead(
        &self,
        id: &str,
        email: Option<&str>,
        external_ref: Option<&str>,
    ) -> Result<bool, SqliteError> {
        lead::update_lead(self.pool(), id, email, external_ref).await
    }

    async fn delete_lead(&self, id: &str) -> Result<bool, SqliteError> {
        lead::delete_lead(self.pool(), id).await
    }

    // ==================== Sessions ====================

    async fn create_session(&self, row: &SessionRow) -> Result<(), SqliteError> {
        session::create_session(self.pool(), row).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRow>, SqliteError> {
        session::get_session(self.pool(), id).await
    }

    async fn list_sessions_for_lead(&self, lead_id: &str) -> Result<Vec<SessionRow>, SqliteError> {
        session::list_sessions_for_lead(self.pool(), lead_id).await
    }

    async fn touch_session(&self, id: &str, touched_at: i64) -> Result<bool, SqliteError> {
        session::touch_session(self.pool(), id, touched_at).await
    }

    async fn set_session_model(&self, id: &str, model: &str) -> Result<bool, SqliteError> {
        session::set_session_model(self.pool(), id, model).await
    }

    async fn batch_touch_sessions(&self, updates: &[SessionTouch]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for update in updates {
            match session::touch_session(self.pool(), &update.session_id, update.touched_at).await
            {
                Ok(true) => outcome.succeeded += 1,
                Ok(false) => {
                    tracing::warn!(session_id = %update.session_id, "Batch touch: session not found");
                    outcome.failed += 1;
                }
                Err(e) => {
                    tracing::warn!(session_id = %update.session_id, error = %e, "Batch touch failed");
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }

    // ==================== Touchpoints ====================

    async fn insert_touchpoint(&self, row: &TouchpointRow) -> Result<(), SqliteError> {
        touchpoint::insert_touchpoint(self.pool(), row).await
    }

    async fn next_ordinal(&self, lead_id: &str) -> Result<i64, SqliteError> {
        touchpoint::next_ordinal(self.pool(), lead_id).await
    }

    async fn list_touchpoints_for_lead(
        &self,
        lead_id: &str,
    ) -> Result<Vec<TouchpointRow>, SqliteError> {
        touchpoint::list_touchpoints_for_lead(self.pool(), lead_id).await
    }

    async fn batch_fetch_touchpoints(
        &self,
        ids: &[String],
    ) -> Result<Vec<TouchpointRow>, SqliteError> {
        touchpoint::batch_fetch_touchpoints(self.pool(), ids).await
    }

    // ==================== Journeys ====================

    async fn save_journey(&self, row: &JourneyRow) -> Result<(), SqliteError> {
        journey::save_journey(self.pool(), row).await
    }

    async fn latest_journey(&self, lead_id: &str) -> Result<Option<JourneyRow>, SqliteError> {
        journey::latest_journey(self.pool(), lead_id).await
    }

    // ==================== Sync audit log ====================

    async fn append_sync_attempt(&self, record: &SyncAttemptRow) -> Result<(), SqliteError> {
        sync_log::append_attempt(self.pool(), record).await
    }

    async fn find_prior_success(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<SyncAttemptRow>, SqliteError> {
        sync_log::find_prior_success(self.pool(), idempotency_key).await
    }

    async fn sync_history(
        &self,
        lead_id: &str,
        destination: &str,
    ) -> Result<Vec<SyncAttemptRow>, SqliteError> {
        sync_log::attempt_history(self.pool(), lead_id, destination).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> SqliteService {
        SqliteService::init_in_memory().await.unwrap()
    }

    fn make_lead(id: &str) -> LeadRow {
        LeadRow {
            id: id.to_string(),
            email: None,
            external_ref: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn make_session(id: &str, lead_id: &str) -> SessionRow {
        SessionRow {
            id: id.to_string(),
            lead_id: lead_id.to_string(),
            first_touch_at: 1000,
            last_touch_at: 1000,
            attribution_model: None,
            source: None,
            medium: None,
            campaign: None,
            created_at: 1000,
            updated_at: 1000,
        }
    }

    #[tokio::test]
    async fn test_trait_roundtrip_through_store() {
        let store = setup_store().await;
        store.create_lead(&make_lead("lead-1")).await.unwrap();
        store.create_session(&make_session("sess-1", "lead-1")).await.unwrap();

        assert!(store.get_lead("lead-1").await.unwrap().is_some());
        assert_eq!(store.next_ordinal("lead-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_batch_touch_counts_partial_failures() {
        let store = setup_store().await;
        store.create_lead(&make_lead("lead-1")).await.unwrap();
        store.create_session(&make_session("sess-1", "lead-1")).await.unwrap();

        let outcome = store
            .batch_touch_sessions(&[
                SessionTouch {
                    session_id: "sess-1".to_string(),
                    touched_at: 5000,
                },
                SessionTouch {
                    session_id: "missing".to_string(),
                    touched_at: 5000,
                },
            ])
            .await;

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failed, 1);
    }
}
