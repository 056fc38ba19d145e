//! The agent-retry confirmation transport.
//!
//! A blocked call's message hands the agent an approval id. The agent
//! retries the call with that id in a distinguished input parameter; this
//! transport spots the parameter, approves the record, and strips the
//! parameter from the surviving input.
//!
//! Known limitation: the retry's payload is not re-verified against the
//! original request; the approval id is the key.

use std::sync::Arc;

use serde_json::{Map, Value};

use clawsec_types::ApprovalStatus;

use crate::approval::store::PendingApprovalStore;

/// Default name of the confirmation parameter.
pub const DEFAULT_CONFIRM_PARAMETER: &str = "_clawsec_confirm";

/// Outcome of inspecting one call's input for a confirmation parameter.
#[derive(Debug, Clone, Default)]
pub struct ConfirmCheck {
    /// The parameter was present (or the transport is disabled).
    pub confirmed: bool,
    /// The parameter carried a usable id that approved a pending record.
    pub valid: bool,
    pub approval_id: Option<String>,
    pub error: Option<String>,
    /// Input with the parameter removed; only set on success. The
    /// original mapping is never mutated.
    pub stripped_input: Option<Map<String, Value>>,
}

pub struct AgentConfirmTransport {
    enabled: bool,
    parameter_name: String,
    store: Arc<PendingApprovalStore>,
}

impl AgentConfirmTransport {
    #[must_use]
    pub fn new(enabled: bool, parameter_name: impl Into<String>, store: Arc<PendingApprovalStore>) -> Self {
        let parameter_name = parameter_name.into();
        let parameter_name = if parameter_name.trim().is_empty() {
            DEFAULT_CONFIRM_PARAMETER.to_string()
        } else {
            parameter_name
        };
        Self {
            enabled,
            parameter_name,
            store,
        }
    }

    #[must_use]
    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    /// Inspect `input` for the confirmation parameter and drive the
    /// approval store accordingly.
    #[must_use]
    pub fn check(&self, input: &Map<String, Value>) -> ConfirmCheck {
        if !self.enabled {
            return ConfirmCheck {
                confirmed: false,
                valid: false,
                error: Some("Agent confirmation is disabled".to_string()),
                ..ConfirmCheck::default()
            };
        }

        let Some(value) = input.get(&self.parameter_name) else {
            return ConfirmCheck::default();
        };

        let id = match value {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                return ConfirmCheck {
                    confirmed: true,
                    valid: false,
                    error: Some(format!(
                        "Confirmation parameter {} must be a non-empty string",
                        self.parameter_name
                    )),
                    ..ConfirmCheck::default()
                };
            }
        };

        if self.store.approve(&id, Some("agent")) {
            tracing::info!(approval_id = %id, "approval confirmed by agent retry");
            return ConfirmCheck {
                confirmed: true,
                valid: true,
                approval_id: Some(id),
                error: None,
                stripped_input: Some(self.strip_confirm_parameter(input)),
            };
        }

        let error = match self.store.get(&id) {
            None => format!("Approval request not found: {id}"),
            Some(record) => match record.status {
                ApprovalStatus::Expired => format!("Approval request has expired: {id}"),
                ApprovalStatus::Approved => format!("Approval request already approved: {id}"),
                ApprovalStatus::Denied => format!("Approval request already denied: {id}"),
                ApprovalStatus::Pending => format!("Approval request could not be approved: {id}"),
            },
        };
        ConfirmCheck {
            confirmed: true,
            valid: false,
            approval_id: Some(id),
            error: Some(error),
            stripped_input: None,
        }
    }

    /// Return a copy of `input` without the confirmation parameter. The
    /// original mapping is untouched.
    #[must_use]
    pub fn strip_confirm_parameter(&self, input: &Map<String, Value>) -> Map<String, Value> {
        let mut stripped = input.clone();
        stripped.remove(&self.parameter_name);
        stripped
    }
}
