//! Shared utility functions

pub mod crypto;
pub mod json;
pub mod retry;
pub mod time;
