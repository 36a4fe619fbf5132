//! Data layer: SQLite persistence, cache overlay, and the storage gateway

pub mod cache;
pub mod gateway;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use gateway::StorageGateway;
pub use traits::{BatchOutcome, JourneyStore};
