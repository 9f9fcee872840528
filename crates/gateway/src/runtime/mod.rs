//! Conversation runtime: routing, wizards, delivery and diagnostics.
//!
//! Entry point: [`Orchestrator::handle`] takes one inbound event for one
//! user. Long-running analyses are detached and report back by editing the
//! message that acknowledged them.

pub mod access;
pub mod analysis;
pub mod delivery;
pub mod menus;
pub mod orchestrator;
pub mod wizard;
pub mod wizards;

pub use access::AccessPolicy;
pub use analysis::{AnalysisOutcome, BusyGuard, BusyPermit, DiagnosticRunner};
pub use delivery::{split_text, MessageDelivery};
pub use menus::Action;
pub use orchestrator::{InboundEvent, Orchestrator};
pub use wizard::{advance, Advance, StepSpec, Validator, WizardEngine, WizardRegistry, WizardSpec};
