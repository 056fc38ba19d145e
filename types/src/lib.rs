//! Core domain types for Clawsec.
//!
//! This crate contains pure domain types with no IO and minimal dependencies.
//! Everything here can be used from any layer of the engine.

mod analysis;
mod approval;
mod context;
mod detection;
mod ledger;
mod time;

pub use analysis::AnalysisResult;
pub use approval::{ApprovalStatus, PendingApprovalRecord};
pub use context::ToolCallContext;
pub use detection::{Action, Detection, Severity, ThreatCategory};
pub use ledger::SpendRecord;
pub use time::now_ms;
