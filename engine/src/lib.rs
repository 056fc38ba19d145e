//! The Clawsec engine: detection, decision, and approval pipeline.
//!
//! [`SecurityEngine`] owns the whole pipeline as explicit state — the
//! approval store, spend ledger, transports, and analyzer are fields of
//! one value, not module-level globals — so a process can host several
//! independent engines and tests can build throwaway ones.

mod analyzer;
mod approval;
mod cache;
mod engine;
mod output_filter;

pub use analyzer::Analyzer;
pub use approval::agent_confirm::{AgentConfirmTransport, ConfirmCheck};
pub use approval::native::{ApprovalOutcome, NativeApprovalHandler};
pub use approval::store::{PendingApprovalStore, SweeperHandle, spawn_sweeper};
pub use approval::webhook::{CallbackResponse, WebhookDecision, WebhookTransport};
pub use cache::AnalysisCache;
pub use engine::{Evaluation, EngineError, PendingApprovalInfo, SecurityEngine};
pub use output_filter::{FilterResult, OutputFilter, Redaction};
