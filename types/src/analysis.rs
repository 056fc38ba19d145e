//! The merged result of running all enabled detectors over one call.

use serde::{Deserialize, Serialize};

use crate::detection::{Action, Detection};

/// Outcome of one analysis pass.
///
/// Invariant: `primary_detection` is present iff `detections` is non-empty,
/// and is the highest-confidence detection (ties broken by higher severity,
/// then by detection order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub action: Action,
    pub detections: Vec<Detection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_detection: Option<Detection>,
    pub cached: bool,
    pub duration_ms: u64,
}

impl AnalysisResult {
    /// The empty result: no detections, action `allow`.
    #[must_use]
    pub fn allow(duration_ms: u64) -> Self {
        Self {
            action: Action::Allow,
            detections: Vec::new(),
            primary_detection: None,
            cached: false,
            duration_ms,
        }
    }

    #[must_use]
    pub fn allowed(&self) -> bool {
        self.action.permits_execution()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_result_has_no_detections() {
        let r = AnalysisResult::allow(3);
        assert_eq!(r.action, Action::Allow);
        assert!(r.detections.is_empty());
        assert!(r.primary_detection.is_none());
        assert!(r.allowed());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(AnalysisResult::allow(0)).unwrap();
        assert!(json.get("durationMs").is_some());
        assert!(json.get("primaryDetection").is_none());
    }
}
