//! Per-user session state for HomeOps.
//!
//! The store keeps one typed record per user for the lifetime of the
//! process: AI-mode flag, bounded conversation history, pending log
//! context, the active wizard and batch-collected messages.

pub mod history;
pub mod store;

pub use history::Speaker;
pub use store::{
    AiMode, Batch, Field, History, PendingContext, Session, SessionStore, UserId, Wizard,
    WizardState,
};
