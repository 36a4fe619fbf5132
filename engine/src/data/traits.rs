//! Storage contract for the engine's persisted entities
//!
//! `JourneyStore` is the seam between the domain layer and the persistence
//! backend. The shipped implementation is SQLite (`data/sqlite`); swapping in
//! another relational store only requires implementing this trait.

use async_trait::async_trait;

use crate::data::sqlite::SqliteError;
use crate::data::types::{JourneyRow, LeadRow, SessionRow, SyncAttemptRow, TouchpointRow};

/// Per-item result counts for batch mutations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub succeeded: u64,
    pub failed: u64,
}

/// One item of a batch session-touch update
#[derive(Debug, Clone)]
pub struct SessionTouch {
    pub session_id: String,
    pub touched_at: i64,
}

/// Uniform read/write access to persisted entities
#[async_trait]
pub trait JourneyStore: Send + Sync {
    // ==================== Leads ====================

    async fn create_lead(&self, lead: &LeadRow) -> Result<(), SqliteError>;
    async fn get_lead(&self, id: &str) -> Result<Option<LeadRow>, SqliteError>;
    async fn update_lead(
        &self,
        id: &str,
        email: Option<&str>,
        external_ref: Option<&str>,
    ) -> Result<bool, SqliteError>;
    async fn delete_lead(&self, id: &str) -> Result<bool, SqliteError>;

    // ==================== Sessions ====================

    async fn create_session(&self, session: &SessionRow) -> Result<(), SqliteError>;
    async fn get_session(&self, id: &str) -> Result<Option<SessionRow>, SqliteError>;
    async fn list_sessions_for_lead(&self, lead_id: &str) -> Result<Vec<SessionRow>, SqliteError>;
    async fn touch_session(&self, id: &str, touched_at: i64) -> Result<bool, SqliteError>;
    async fn set_session_model(&self, id: &str, model: &str) -> Result<bool, SqliteError>;

    /// Batch last-touch updates. Items are independent: one failure never
    /// aborts the rest, the outcome reports per-item counts.
    async fn batch_touch_sessions(&self, updates: &[SessionTouch]) -> BatchOutcome;

    // ==================== Touchpoints ====================

    async fn insert_touchpoint(&self, touchpoint: &TouchpointRow) -> Result<(), SqliteError>;
    async fn next_ordinal(&self, lead_id: &str) -> Result<i64, SqliteError>;
    async fn list_touchpoints_for_lead(
        &self,
        lead_id: &str,
    ) -> Result<Vec<TouchpointRow>, SqliteError>;
    async fn batch_fetch_touchpoints(
        &self,
        ids: &[String],
    ) -> Result<Vec<TouchpointRow>, SqliteError>;

    // ==================== Journeys ====================

    async fn save_journey(&self, journey: &JourneyRow) -> Result<(), SqliteError>;
    async fn latest_journey(&self, lead_id: &str) -> Result<Option<JourneyRow>, SqliteError>;

    // ==================== Sync audit log ====================

    async fn append_sync_attempt(&self, record: &SyncAttemptRow) -> Result<(), SqliteError>;
    async fn find_prior_success(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<SyncAttemptRow>, SqliteError>;
    async fn sync_history(
        &self,
        lead_id: &str,
        destination: &str,
    ) -> Result<Vec<SyncAttemptRow>, SqliteError>;
}
