//! Core engine infrastructure: configuration, constants, errors

pub mod config;
pub mod constants;
pub mod error;

pub use config::EngineConfig;
pub use error::EngineError;
