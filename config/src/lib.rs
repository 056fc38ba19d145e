//! Configuration loading, validation, and file discovery for Clawsec.

mod discovery;
mod merge;
mod schema;

pub use discovery::{CONFIG_FILE_NAMES, discover_config_file, load_config, parse_config};
pub use merge::merge_values;
pub use schema::{
    ApprovalConfig, AgentConfirmConfig, Config, DestructiveRule, DomainListMode, DomainsConfig,
    ExfiltrationRule, GlobalConfig, LlmConfig, LogLevel, NativeApprovalConfig, PurchaseRule,
    RulesConfig, SanitizationCategories, SanitizationRule, SecretsRule, SpendLimits, SubDetector,
    WebhookApprovalConfig, WebsiteRule,
};

use thiserror::Error;

/// Rejected schema or unreadable file.
///
/// Surfaced to the caller on startup; the engine falls back to built-in
/// defaults when a file is missing, never when one is malformed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}
