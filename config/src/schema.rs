//! The configuration schema with built-in defaults.
//!
//! Field names follow the on-disk YAML (camelCase). Every section is
//! optional; a missing section takes its defaults, so an empty file is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use clawsec_types::{Action, Severity};

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The `tracing` filter directive for this level.
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainListMode {
    Blocklist,
    Allowlist,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub version: String,
    pub global: GlobalConfig,
    pub llm: LlmConfig,
    pub rules: RulesConfig,
    pub approval: ApprovalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            global: GlobalConfig::default(),
            llm: LlmConfig::default(),
            rules: RulesConfig::default(),
            approval: ApprovalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalConfig {
    pub enabled: bool,
    pub log_level: LogLevel,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: LogLevel::Info,
        }
    }
}

/// The LLM-assist hook is advisory; disabling it never changes soundness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub model: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RulesConfig {
    pub purchase: PurchaseRule,
    pub website: WebsiteRule,
    pub destructive: DestructiveRule,
    pub secrets: SecretsRule,
    pub exfiltration: ExfiltrationRule,
    pub sanitization: SanitizationRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurchaseRule {
    pub enabled: bool,
    pub severity: Severity,
    pub action: Action,
    pub spend_limits: Option<SpendLimits>,
    pub domains: DomainsConfig,
}

impl Default for PurchaseRule {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: Severity::High,
            action: Action::Block,
            spend_limits: Some(SpendLimits::default()),
            domains: DomainsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpendLimits {
    pub per_transaction: f64,
    pub daily: f64,
}

impl Default for SpendLimits {
    fn default() -> Self {
        Self {
            per_transaction: 100.0,
            daily: 500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomainsConfig {
    pub mode: DomainListMode,
    pub blocklist: Vec<String>,
}

impl Default for DomainsConfig {
    fn default() -> Self {
        Self {
            mode: DomainListMode::Blocklist,
            blocklist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebsiteRule {
    pub enabled: bool,
    pub mode: DomainListMode,
    pub severity: Severity,
    pub action: Action,
    pub blocklist: Vec<String>,
    pub allowlist: Vec<String>,
}

impl Default for WebsiteRule {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: DomainListMode::Blocklist,
            severity: Severity::High,
            action: Action::Block,
            blocklist: Vec::new(),
            allowlist: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DestructiveRule {
    pub enabled: bool,
    pub severity: Severity,
    pub action: Action,
    pub shell: SubDetector,
    pub cloud: SubDetector,
    pub code: SubDetector,
}

impl Default for DestructiveRule {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: Severity::Critical,
            action: Action::Confirm,
            shell: SubDetector::default(),
            cloud: SubDetector::default(),
            code: SubDetector::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubDetector {
    pub enabled: bool,
}

impl Default for SubDetector {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecretsRule {
    pub enabled: bool,
    pub severity: Severity,
    pub action: Action,
}

impl Default for SecretsRule {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: Severity::Critical,
            action: Action::Block,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExfiltrationRule {
    pub enabled: bool,
    pub severity: Severity,
    pub action: Action,
}

impl Default for ExfiltrationRule {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: Severity::High,
            action: Action::Block,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SanitizationRule {
    pub enabled: bool,
    pub severity: Severity,
    pub action: Action,
    pub min_confidence: f64,
    pub redact_matches: bool,
    pub categories: SanitizationCategories,
}

impl Default for SanitizationRule {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: Severity::High,
            action: Action::Block,
            min_confidence: 0.5,
            redact_matches: false,
            categories: SanitizationCategories::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SanitizationCategories {
    pub instruction_override: bool,
    pub system_leak: bool,
    pub jailbreak: bool,
    pub encoded_payload: bool,
}

impl Default for SanitizationCategories {
    fn default() -> Self {
        Self {
            instruction_override: true,
            system_leak: true,
            jailbreak: true,
            encoded_payload: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalConfig {
    pub native: NativeApprovalConfig,
    pub agent_confirm: AgentConfirmConfig,
    pub webhook: WebhookApprovalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NativeApprovalConfig {
    pub enabled: bool,
    /// Approval TTL in seconds; must be positive.
    pub timeout: u64,
}

impl Default for NativeApprovalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfirmConfig {
    pub enabled: bool,
    pub parameter_name: String,
}

impl Default for AgentConfirmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            parameter_name: "_clawsec_confirm".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookApprovalConfig {
    pub enabled: bool,
    pub url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub headers: HashMap<String, String>,
    /// Optional template for the outgoing `callbackUrl`; `{id}` is
    /// substituted with the approval id.
    pub callback_url_template: Option<String>,
}

impl Default for WebhookApprovalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            timeout: 30,
            headers: HashMap::new(),
            callback_url_template: None,
        }
    }
}

impl Config {
    /// Validate cross-field constraints the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(limits) = &self.rules.purchase.spend_limits {
            if limits.per_transaction < 0.0 {
                return Err(ConfigError::invalid(
                    "rules.purchase.spendLimits.perTransaction",
                    "limit must be non-negative",
                ));
            }
            if limits.daily < 0.0 {
                return Err(ConfigError::invalid(
                    "rules.purchase.spendLimits.daily",
                    "limit must be non-negative",
                ));
            }
        }

        if self.rules.sanitization.min_confidence < 0.0
            || self.rules.sanitization.min_confidence > 1.0
        {
            return Err(ConfigError::invalid(
                "rules.sanitization.minConfidence",
                "must be within [0, 1]",
            ));
        }

        if self.approval.native.timeout == 0 {
            return Err(ConfigError::invalid(
                "approval.native.timeout",
                "timeout must be positive",
            ));
        }
        if self.approval.webhook.timeout == 0 {
            return Err(ConfigError::invalid(
                "approval.webhook.timeout",
                "timeout must be positive",
            ));
        }

        if let Some(url) = &self.approval.webhook.url
            && url::Url::parse(url).is_err()
        {
            return Err(ConfigError::invalid(
                "approval.webhook.url",
                format!("'{url}' is not a valid URL"),
            ));
        }
        if self.approval.webhook.enabled && self.approval.webhook.url.is_none() {
            return Err(ConfigError::invalid(
                "approval.webhook.url",
                "required when the webhook transport is enabled",
            ));
        }

        for (field, action) in [
            ("rules.purchase.action", self.rules.purchase.action),
            ("rules.website.action", self.rules.website.action),
            ("rules.destructive.action", self.rules.destructive.action),
            ("rules.secrets.action", self.rules.secrets.action),
            ("rules.exfiltration.action", self.rules.exfiltration.action),
            ("rules.sanitization.action", self.rules.sanitization.action),
        ] {
            if action == Action::Allow {
                return Err(ConfigError::invalid(
                    field,
                    "'allow' is the absence-of-detection default and is never configured",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_schema() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert!(config.global.enabled);
        assert_eq!(config.global.log_level, LogLevel::Info);
        assert!(config.llm.enabled);
        assert_eq!(config.llm.model, None);

        let limits = config.rules.purchase.spend_limits.unwrap();
        assert!((limits.per_transaction - 100.0).abs() < f64::EPSILON);
        assert!((limits.daily - 500.0).abs() < f64::EPSILON);

        assert_eq!(config.rules.website.severity, Severity::High);
        assert_eq!(config.rules.destructive.action, Action::Confirm);
        assert_eq!(config.rules.secrets.severity, Severity::Critical);
        assert!((config.rules.sanitization.min_confidence - 0.5).abs() < f64::EPSILON);

        assert_eq!(config.approval.native.timeout, 300);
        assert_eq!(config.approval.agent_confirm.parameter_name, "_clawsec_confirm");
        assert!(!config.approval.webhook.enabled);
        assert_eq!(config.approval.webhook.timeout, 30);
    }

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_negative_limits() {
        let mut config = Config::default();
        config.rules.purchase.spend_limits = Some(SpendLimits {
            per_transaction: -1.0,
            daily: 500.0,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_native_timeout() {
        let mut config = Config::default();
        config.approval.native.timeout = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_url_webhook() {
        let mut config = Config::default();
        config.approval.webhook.url = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_enabled_webhook_without_url() {
        let mut config = Config::default();
        config.approval.webhook.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_configured_allow_action() {
        let mut config = Config::default();
        config.rules.secrets.action = Action::Allow;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_min_confidence() {
        let mut config = Config::default();
        config.rules.sanitization.min_confidence = 1.5;
        assert!(config.validate().is_err());
    }
}
