//! Row types for persisted entities
//!
//! Timestamps are stored as milliseconds since Unix epoch. Touchpoint
//! ordering needs sub-second precision because the per-lead ordinal only
//! breaks ties, it does not replace the timestamp.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tracked lead (the person behind an enquiry)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeadRow {
    pub id: String,
    pub email: Option<String>,
    pub external_ref: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One browsing session for one lead
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SessionRow {
    /// Opaque session key, minted by the caller
    pub id: String,
    pub lead_id: String,
    pub first_touch_at: i64,
    pub last_touch_at: i64,
    /// Attribution model used for this session's summary, if any
    pub attribution_model: Option<String>,
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One discrete marketing interaction. Immutable once written.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TouchpointRow {
    pub id: String,
    pub session_id: String,
    pub lead_id: String,
    /// Monotonic per lead; breaks occurred_at ties deterministically
    pub ordinal: i64,
    pub channel: String,
    pub campaign: Option<String>,
    pub occurred_at: i64,
    /// Raw parameter bag (UTM fields, click identifiers), JSON-encoded
    pub params: Option<String>,
    pub created_at: i64,
}

/// Materialized journey + attribution result for one lead.
/// Rebuilt whole on every recomputation; newer `assembled_at` supersedes.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JourneyRow {
    pub id: String,
    pub lead_id: String,
    pub model: String,
    pub touchpoint_count: i64,
    /// Credit fractions, JSON-encoded `Vec<CreditShare>`
    pub credits: String,
    pub assembled_at: i64,
}

/// One conversion dispatch attempt. Append-only; retries add rows, never mutate.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SyncAttemptRow {
    pub id: String,
    pub lead_id: String,
    pub destination: String,
    pub idempotency_key: String,
    pub attempt: i64,
    /// pending | success | failed | rejected
    pub outcome: String,
    pub http_status: Option<i64>,
    pub request_snapshot: String,
    pub response_snapshot: Option<String>,
    pub created_at: i64,
}

/// Outcome of a single dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Pending,
    Success,
    Failed,
    Rejected,
}

impl SyncOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Pending => "pending",
            SyncOutcome::Success => "success",
            SyncOutcome::Failed => "failed",
            SyncOutcome::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SyncOutcome::Pending),
            "success" => Some(SyncOutcome::Success),
            "failed" => Some(SyncOutcome::Failed),
            "rejected" => Some(SyncOutcome::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel attributes captured with an incoming visit event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelAttrs {
    pub channel: String,
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    /// Raw UTM fields / click identifiers, passed through untouched
    #[serde(default)]
    pub params: serde_json::Value,
}

impl ChannelAttrs {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..Default::default()
        }
    }

    pub fn with_campaign(mut self, campaign: impl Into<String>) -> Self {
        self.campaign = Some(campaign.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_outcome_roundtrip() {
        for outcome in [
            SyncOutcome::Pending,
            SyncOutcome::Success,
            SyncOutcome::Failed,
            SyncOutcome::Rejected,
        ] {
            assert_eq!(SyncOutcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(SyncOutcome::parse("bogus"), None);
    }

    #[test]
    fn test_channel_attrs_builder() {
        let attrs = ChannelAttrs::new("paid-search").with_campaign("spring-sale");
        assert_eq!(attrs.channel, "paid-search");
        assert_eq!(attrs.campaign.as_deref(), Some("spring-sale"));
        assert!(attrs.params.is_null());
    }
}
