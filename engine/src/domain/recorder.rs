//! Touchpoint recording: validated, ordered ingestion of visit events
//!
//! Every accepted event either lands durably or returns an error; there is no
//! silent drop path. Per-lead ordinal assignment runs under a per-lead async
//! mutex so concurrent events for the same lead get distinct ordinals; the
//! UNIQUE (lead_id, ordinal) constraint backstops the lock at the database.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::EngineError;
use crate::core::config::RecorderConfig;
use crate::data::StorageGateway;
use crate::data::types::{ChannelAttrs, SessionRow, TouchpointRow};

pub struct TouchpointRecorder {
    gateway: Arc<StorageGateway>,
    config: RecorderConfig,
    /// Per-lead write serialization for ordinal assignment
    ordinal_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TouchpointRecorder {
    pub fn new(gateway: Arc<StorageGateway>, config: RecorderConfig) -> Self {
        Self {
            gateway,
            config,
            ordinal_locks: DashMap::new(),
        }
    }

    /// Record one marketing interaction.
    ///
    /// Validates the lead reference and timestamp, upserts the session,
    /// assigns the next per-lead ordinal, and persists the immutable
    /// touchpoint. Cached journey data for the lead is invalidated before
    /// returning, so the event is visible to the next assembly.
    ///
    /// `occurred_at` is the client-supplied event time; `None` means the
    /// event is happening now.
    pub async fn record(
        &self,
        lead_id: &str,
        session_key: &str,
        attrs: ChannelAttrs,
        occurred_at: Option<DateTime<Utc>>,
    ) -> Result<TouchpointRow, EngineError> {
        if attrs.channel.trim().is_empty() {
            return Err(EngineError::Validation("channel must not be empty".into()));
        }
        if session_key.trim().is_empty() {
            return Err(EngineError::Validation("session_key must not be empty".into()));
        }

        if self.gateway.get_lead(lead_id).await?.is_none() {
            return Err(EngineError::Validation(format!(
                "unknown lead: {lead_id}"
            )));
        }

        let now = Utc::now();
        let occurred_at = occurred_at.unwrap_or(now);
        let occurred_ms = occurred_at.timestamp_millis();
        let skew_limit_ms =
            now.timestamp_millis() + (self.config.clock_skew_tolerance_secs * 1000) as i64;
        if occurred_ms > skew_limit_ms {
            return Err(EngineError::Validation(format!(
                "timestamp {occurred_ms} is beyond the clock skew tolerance"
            )));
        }

        // Serialize writes per lead. The guard covers session upsert through
        // touchpoint insert so ordinal allocation cannot race.
        let lock = self
            .ordinal_locks
            .entry(lead_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;
        let result = self
            .record_locked(lead_id, session_key, attrs, occurred_ms, now)
            .await;
        drop(guard);
        drop(lock);

        // Evict the lead's lock entry unless another recorder already holds
        // a clone; the entry shard stays locked during the check, so a racing
        // `entry()` either sees this entry or inserts a fresh one after it.
        self.ordinal_locks
            .remove_if(lead_id, |_, entry| Arc::strong_count(entry) == 1);

        result
    }

    async fn record_locked(
        &self,
        lead_id: &str,
        session_key: &str,
        attrs: ChannelAttrs,
        occurred_ms: i64,
        now: DateTime<Utc>,
    ) -> Result<TouchpointRow, EngineError> {
        self.upsert_session(lead_id, session_key, &attrs, occurred_ms, now)
            .await?;

        let ordinal = self.gateway.store().next_ordinal(lead_id).await?;
        let params = if attrs.params.is_null() {
            None
        } else {
            Some(attrs.params.to_string())
        };

        let touchpoint = TouchpointRow {
            id: Uuid::new_v4().to_string(),
            session_id: session_key.to_string(),
            lead_id: lead_id.to_string(),
            ordinal,
            channel: attrs.channel,
            campaign: attrs.campaign,
            occurred_at: occurred_ms,
            params,
            created_at: now.timestamp_millis(),
        };

        self.gateway.insert_touchpoint(&touchpoint).await?;

        tracing::debug!(
            lead_id = %lead_id,
            session_key = %session_key,
            ordinal,
            channel = %touchpoint.channel,
            "Recorded touchpoint"
        );

        Ok(touchpoint)
    }

    /// Create the session on first sight, extend its touch window otherwise.
    async fn upsert_session(
        &self,
        lead_id: &str,
        session_key: &str,
        attrs: &ChannelAttrs,
        occurred_ms: i64,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        match self.gateway.store().get_session(session_key).await? {
            Some(existing) => {
                if existing.lead_id != lead_id {
                    return Err(EngineError::Validation(format!(
                        "session {session_key} belongs to a different lead"
                    )));
                }
                self.gateway
                    .touch_session(lead_id, session_key, occurred_ms)
                    .await?;
            }
            None => {
                let session = SessionRow {
                    id: session_key.to_string(),
                    lead_id: lead_id.to_string(),
                    first_touch_at: occurred_ms,
                    last_touch_at: occurred_ms,
                    attribution_model: None,
                    source: attrs.source.clone(),
                    medium: attrs.medium.clone(),
                    campaign: attrs.campaign.clone(),
                    created_at: now.timestamp_millis(),
                    updated_at: now.timestamp_millis(),
                };
                self.gateway.create_session(&session).await?;
            }
        }
        Ok(())
    }
}
