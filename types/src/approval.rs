//! Pending-approval records and their lifecycle states.

use serde::{Deserialize, Serialize};

use crate::context::ToolCallContext;
use crate::detection::Detection;

/// Lifecycle state of a pending approval.
///
/// `Pending` is the only non-terminal state. The only transitions are
/// `pending -> approved`, `pending -> denied`, and `pending -> expired`
/// (the last purely via time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

impl ApprovalStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// One approval request held in the store while a human, agent, or webhook
/// decides the fate of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApprovalRecord {
    pub id: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds; `expires_at <= now` means expired.
    pub expires_at: i64,
    pub detection: Detection,
    pub tool_call: ToolCallContext,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
}

impl PendingApprovalRecord {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        expires_at: i64,
        detection: Detection,
        tool_call: ToolCallContext,
    ) -> Self {
        debug_assert!(created_at <= expires_at);
        Self {
            id: id.into(),
            created_at,
            expires_at,
            detection,
            tool_call,
            status: ApprovalStatus::Pending,
            approved_at: None,
            approved_by: None,
        }
    }

    /// Whether this record's TTL has elapsed at `now` (epoch ms).
    ///
    /// `expires_at == now` counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Severity, ThreatCategory};
    use serde_json::Map;

    fn record(expires_at: i64) -> PendingApprovalRecord {
        PendingApprovalRecord::new(
            "approval-test-1",
            0,
            expires_at,
            Detection::new(ThreatCategory::Destructive, Severity::Critical, 0.95, "rm"),
            ToolCallContext::new("Bash", Map::new()),
        )
    }

    #[test]
    fn new_records_are_pending() {
        let r = record(1_000);
        assert_eq!(r.status, ApprovalStatus::Pending);
        assert!(!r.status.is_terminal());
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let r = record(1_000);
        assert!(!r.is_expired_at(999));
        assert!(r.is_expired_at(1_000));
        assert!(r.is_expired_at(1_001));
    }

    #[test]
    fn terminal_states() {
        for status in [
            ApprovalStatus::Approved,
            ApprovalStatus::Denied,
            ApprovalStatus::Expired,
        ] {
            assert!(status.is_terminal());
        }
    }
}
