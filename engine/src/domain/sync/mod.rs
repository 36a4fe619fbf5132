//! Conversion sync: idempotent delivery of attributed conversions
//!
//! The dispatcher owns the delivery lifecycle (idempotency, classification,
//! retry, audit); destinations own only transport. The worker pool layers a
//! bounded queue on top for background delivery.

pub mod audit;
pub mod destination;
pub mod dispatcher;
pub mod payload;
pub mod worker;

pub use audit::SyncAuditLog;
pub use destination::{Delivery, Destination, HttpDestination};
pub use dispatcher::{DispatchOutcome, SyncDispatcher};
pub use payload::{AttributedChannel, ConversionPayload};
pub use worker::{SyncJob, SyncWorkerPool};
