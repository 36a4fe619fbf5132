//! Conversion payload construction and idempotency keys
//!
//! The idempotency key is derived from (lead, destination, payload content).
//! Identical re-dispatches produce the same key and short-circuit against the
//! audit log; any change to the attributed summary yields a new key and a
//! genuine new delivery.

use serde::{Deserialize, Serialize};

use crate::data::types::LeadRow;
use crate::domain::attribution::AttributionResult;
use crate::utils::crypto::{hash_email, sha256_hex};
use crate::utils::json::normalize_json_for_hash;

/// One attributed channel entry inside the payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributedChannel {
    pub channel: String,
    pub campaign: Option<String>,
    pub fraction: f64,
}

/// The conversion record sent to a destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionPayload {
    pub lead_id: String,
    pub external_ref: Option<String>,
    /// SHA-256 of the normalized email, the matching format conversions APIs expect
    pub email_hash: Option<String>,
    pub model: String,
    /// Highest-credit channel, ties broken by earliest position
    pub primary_channel: Option<String>,
    pub primary_campaign: Option<String>,
    pub channels: Vec<AttributedChannel>,
    pub touchpoint_count: usize,
}

impl ConversionPayload {
    /// Build a payload from the lead record and its attribution result.
    pub fn build(lead: &LeadRow, attribution: &AttributionResult) -> Self {
        let primary = attribution.primary();
        Self {
            lead_id: lead.id.clone(),
            external_ref: lead.external_ref.clone(),
            email_hash: lead.email.as_deref().map(hash_email),
            model: attribution.model.to_string(),
            primary_channel: primary.map(|p| p.channel.clone()),
            primary_campaign: primary.and_then(|p| p.campaign.clone()),
            channels: attribution
                .credits
                .iter()
                .map(|c| AttributedChannel {
                    channel: c.channel.clone(),
                    campaign: c.campaign.clone(),
                    fraction: c.fraction,
                })
                .collect(),
            touchpoint_count: attribution.credits.len(),
        }
    }

    /// JSON wire form
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Content hash over the canonical JSON form (key order independent)
    pub fn content_hash(&self) -> String {
        sha256_hex(&normalize_json_for_hash(&self.to_json()))
    }

    /// Idempotency key binding lead, destination, and payload content
    pub fn idempotency_key(&self, destination_id: &str) -> String {
        sha256_hex(&format!(
            "{}:{}:{}",
            self.lead_id,
            destination_id,
            self.content_hash()
        ))
    }
}
