//! Top-level engine error type
//!
//! Layer-specific errors (`SqliteError`, `CacheError`) are wrapped here so
//! callers see one surface. Delivery outcomes that are signals rather than
//! faults (`NotReady`, `InFlight`) are separate variants so hosts can match
//! on them without string inspection.

use thiserror::Error;

use crate::data::cache::CacheError;
use crate::data::sqlite::SqliteError;

/// Unified error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad input — rejected immediately, never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// Persistence layer failure — propagated, the caller retries the whole operation
    #[error("Storage error: {0}")]
    Storage(#[from] SqliteError),

    /// Cache layer failure surfaced where it cannot be degraded to a loader call
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Attribution attempted on an empty journey — a signaled condition, not a fault
    #[error("Journey for lead {lead_id} has no touchpoints yet")]
    NotReady { lead_id: String },

    /// Another dispatch attempt for the same (lead, destination) pair is in flight
    #[error("Dispatch for lead {lead_id} to {destination} already in flight")]
    InFlight { lead_id: String, destination: String },

    /// Transient destination failure — retried with backoff up to a cap
    #[error("Retryable delivery failure to {destination}: {detail}")]
    RetryableDelivery { destination: String, detail: String },

    /// Destination rejected the payload — logged and surfaced, never auto-retried
    #[error("Permanent delivery failure to {destination}: {detail}")]
    PermanentDelivery { destination: String, detail: String },

    /// Audit record could not be written; the attempt outcome must be treated as unknown
    #[error("Audit write failed for key {idempotency_key}: {detail}")]
    AuditWrite {
        idempotency_key: String,
        detail: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether this error represents a condition worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Storage(_) | EngineError::RetryableDelivery { .. }
        )
    }
}
