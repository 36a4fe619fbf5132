//! Entity repositories for SQLite operations
//!
//! Each module exposes free async functions over `&SqlitePool`, keeping SQL
//! close to the entity it serves.

pub mod journey;
pub mod lead;
pub mod session;
pub mod sync_log;
pub mod touchpoint;
