//! Threat detection vocabulary: severities, actions, categories, and the
//! `Detection` record emitted by every category detector.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How bad a detection is.
///
/// Variant order matters: the derived `Ord` makes `Critical` the greatest,
/// so severity tie-breaks can use plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// The engine's verdict for one tool call.
///
/// `Allow` is the absence-of-detection default and is never written in
/// configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Block,
    Confirm,
    AgentConfirm,
    Warn,
    Log,
    Allow,
}

impl Action {
    /// Whether a tool call with this verdict may proceed without approval.
    #[must_use]
    pub fn permits_execution(self) -> bool {
        matches!(self, Self::Allow | Self::Log | Self::Warn)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Block => "block",
            Self::Confirm => "confirm",
            Self::AgentConfirm => "agent-confirm",
            Self::Warn => "warn",
            Self::Log => "log",
            Self::Allow => "allow",
        };
        f.write_str(s)
    }
}

/// The six threat categories a detector can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatCategory {
    Purchase,
    Website,
    Destructive,
    Secrets,
    Exfiltration,
    Sanitization,
}

impl std::fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Purchase => "purchase",
            Self::Website => "website",
            Self::Destructive => "destructive",
            Self::Secrets => "secrets",
            Self::Exfiltration => "exfiltration",
            Self::Sanitization => "sanitization",
        };
        f.write_str(s)
    }
}

/// A single signal emitted by one detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub category: ThreatCategory,
    pub severity: Severity,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Detection {
    #[must_use]
    pub fn new(
        category: ThreatCategory,
        severity: Severity,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
            metadata: Map::new(),
        }
    }

    /// Attach a metadata entry, overwriting any previous value for the key.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}
