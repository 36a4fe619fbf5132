//! adtrail-engine: marketing attribution and conversion sync
//!
//! The engine records touchpoints per lead, assembles them into ordered,
//! deduplicated journeys, distributes conversion credit under pluggable
//! attribution models, and pushes attributed conversion records to external
//! destinations with idempotency guarantees and a full audit trail.
//!
//! Layering:
//!
//! - [`core`] — configuration, constants, and the top-level error type
//! - [`data`] — SQLite persistence, cache overlay, and the storage gateway
//! - [`domain`] — recorder, journey assembler, attribution models, sync
//! - [`utils`] — hashing, time, JSON canonicalization, retry backoff

pub mod core;
pub mod data;
pub mod domain;
pub mod utils;

pub use crate::core::{EngineConfig, EngineError};
pub use data::StorageGateway;
pub use domain::attribution::{AttributionModel, AttributionResult};
pub use domain::journey::JourneyAssembler;
pub use domain::recorder::TouchpointRecorder;
pub use domain::sync::{Destination, DispatchOutcome, SyncDispatcher, SyncWorkerPool};
