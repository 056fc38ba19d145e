//! The in-process operator transport: approve/deny by id.

use std::sync::Arc;

use clawsec_types::{ApprovalStatus, PendingApprovalRecord};

use crate::approval::store::PendingApprovalStore;

/// Result of an operator decision.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub success: bool,
    pub message: String,
    pub record: Option<PendingApprovalRecord>,
}

impl ApprovalOutcome {
    fn failure(message: impl Into<String>, record: Option<PendingApprovalRecord>) -> Self {
        Self {
            success: false,
            message: message.into(),
            record,
        }
    }
}

#[derive(Clone)]
pub struct NativeApprovalHandler {
    store: Arc<PendingApprovalStore>,
}

impl NativeApprovalHandler {
    #[must_use]
    pub fn new(store: Arc<PendingApprovalStore>) -> Self {
        Self { store }
    }

    /// Approve a pending record. Every failure message names the id so
    /// the operator can act without log access.
    #[must_use]
    pub fn handle_approve(&self, id: &str, approved_by: Option<&str>) -> ApprovalOutcome {
        let id = id.trim();
        if id.is_empty() {
            return ApprovalOutcome::failure("Invalid approval id", None);
        }

        let Some(record) = self.store.get(id) else {
            return ApprovalOutcome::failure(format!("Approval request not found: {id}"), None);
        };

        match record.status {
            ApprovalStatus::Pending => {
                if self.store.approve(id, approved_by) {
                    let record = self.store.get(id);
                    tracing::info!(approval_id = id, approved_by, "approval granted");
                    ApprovalOutcome {
                        success: true,
                        message: format!("Approved: {id}"),
                        record,
                    }
                } else {
                    // Lost a race with another transport; report the state
                    // that won.
                    self.handle_approve(id, approved_by)
                }
            }
            ApprovalStatus::Expired => ApprovalOutcome::failure(
                format!("Approval request has expired: {id}"),
                Some(record),
            ),
            ApprovalStatus::Approved => ApprovalOutcome::failure(
                format!("Approval request already approved: {id}"),
                Some(record),
            ),
            ApprovalStatus::Denied => ApprovalOutcome::failure(
                format!("Approval request already denied: {id}"),
                Some(record),
            ),
        }
    }

    /// Deny a pending record; same guards as approval.
    #[must_use]
    pub fn handle_deny(&self, id: &str) -> ApprovalOutcome {
        let id = id.trim();
        if id.is_empty() {
            return ApprovalOutcome::failure("Invalid approval id", None);
        }

        let Some(record) = self.store.get(id) else {
            return ApprovalOutcome::failure(format!("Approval request not found: {id}"), None);
        };

        match record.status {
            ApprovalStatus::Pending => {
                if self.store.deny(id) {
                    let record = self.store.get(id);
                    tracing::info!(approval_id = id, "approval denied");
                    ApprovalOutcome {
                        success: true,
                        message: format!("Denied: {id}"),
                        record,
                    }
                } else {
                    self.handle_deny(id)
                }
            }
            ApprovalStatus::Expired => ApprovalOutcome::failure(
                format!("Approval request has expired: {id}"),
                Some(record),
            ),
            ApprovalStatus::Approved => ApprovalOutcome::failure(
                format!("Approval request already approved and cannot be denied: {id}"),
                Some(record),
            ),
            ApprovalStatus::Denied => ApprovalOutcome::failure(
                format!("Approval request already denied: {id}"),
                Some(record),
            ),
        }
    }
}
