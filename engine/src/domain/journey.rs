//! Journey assembly: ordered, deduplicated touchpoint sequences per lead
//!
//! # Ordering
//!
//! Touchpoints are totally ordered by `(occurred_at, ordinal)`. The ordinal is
//! monotonic per lead, so two events recorded at the same millisecond still
//! sort deterministically, in arrival order.
//!
//! # Deduplication
//!
//! Tracking scripts fire duplicate events: double-loaded pages, retried
//! beacons, the same redirect captured twice. Two touchpoints are considered
//! the same interaction when their identity matches: same channel, same
//! campaign, and timestamps falling into the same bucket (default 1 s wide).
//! The earliest entry in sort order wins; later duplicates are dropped from
//! the assembled journey but remain in storage.

use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::StorageGateway;
use crate::data::types::TouchpointRow;
use crate::utils::time::{millis_to_datetime, truncate_to_bucket};

/// One entry of an assembled journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyTouchpoint {
    pub id: String,
    pub ordinal: i64,
    pub channel: String,
    pub campaign: Option<String>,
    pub occurred_at: i64,
}

impl From<&TouchpointRow> for JourneyTouchpoint {
    fn from(row: &TouchpointRow) -> Self {
        Self {
            id: row.id.clone(),
            ordinal: row.ordinal,
            channel: row.channel.clone(),
            campaign: row.campaign.clone(),
            occurred_at: row.occurred_at,
        }
    }
}

/// Stable snapshot of one lead's marketing journey.
///
/// Re-readable: iterating twice yields the same sequence. Rebuilt from
/// storage on each assembly; an empty journey is a valid value, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub lead_id: String,
    pub touchpoints: Vec<JourneyTouchpoint>,
}

impl Journey {
    pub fn len(&self) -> usize {
        self.touchpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touchpoints.is_empty()
    }

    pub fn first(&self) -> Option<&JourneyTouchpoint> {
        self.touchpoints.first()
    }

    pub fn last(&self) -> Option<&JourneyTouchpoint> {
        self.touchpoints.last()
    }
}

/// Identity hash for near-duplicate collapsing.
///
/// Same channel + same campaign + timestamps in the same bucket ⇒ same
/// interaction.
fn identity_hash(touchpoint: &TouchpointRow, bucket_secs: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    touchpoint.channel.hash(&mut hasher);
    touchpoint.campaign.hash(&mut hasher);
    truncate_to_bucket(millis_to_datetime(touchpoint.occurred_at), bucket_secs).hash(&mut hasher);
    hasher.finish()
}

/// Assembles journeys from persisted touchpoints
pub struct JourneyAssembler {
    gateway: Arc<StorageGateway>,
    dedup_bucket_secs: u64,
}

impl JourneyAssembler {
    pub fn new(gateway: Arc<StorageGateway>, dedup_bucket_secs: u64) -> Self {
        Self {
            gateway,
            dedup_bucket_secs,
        }
    }

    /// Assemble the journey for a lead.
    ///
    /// Unknown leads and leads without touchpoints produce an empty journey.
    /// Two assemblies with no intervening writes yield identical sequences.
    pub async fn assemble(&self, lead_id: &str) -> Result<Journey, crate::core::EngineError> {
        let rows = self.gateway.list_touchpoints(lead_id).await?;
        Ok(self.assemble_from_rows(lead_id, rows))
    }

    /// Pure assembly step over already-fetched rows.
    pub fn assemble_from_rows(&self, lead_id: &str, mut rows: Vec<TouchpointRow>) -> Journey {
        rows.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then(a.ordinal.cmp(&b.ordinal))
        });

        let input_count = rows.len();
        let mut seen: HashSet<u64> = HashSet::with_capacity(rows.len());
        let mut touchpoints = Vec::with_capacity(rows.len());

        for row in &rows {
            // First occurrence in sort order wins (earliest occurred_at, lowest ordinal)
            if seen.insert(identity_hash(row, self.dedup_bucket_secs)) {
                touchpoints.push(JourneyTouchpoint::from(row));
            }
        }

        if touchpoints.len() < input_count {
            tracing::debug!(
                lead_id = %lead_id,
                input = input_count,
                output = touchpoints.len(),
                "Collapsed duplicate touchpoints during assembly"
            );
        }

        Journey {
            lead_id: lead_id.to_string(),
            touchpoints,
        }
    }
}
