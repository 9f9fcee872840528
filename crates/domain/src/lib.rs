//! Shared domain types for HomeOps: the error taxonomy, the configuration
//! tree and structured trace events.

pub mod config;
pub mod error;
pub mod trace;
