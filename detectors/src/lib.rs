//! Category detectors for Clawsec.
//!
//! Each detector satisfies a single capability: inspect a
//! [`ToolCallContext`] and emit at most one [`Detection`]. Detectors are
//! independent; the analyzer treats them uniformly through [`Detector`].
//! Every detector is sound-by-disabled: with its `enabled` flag off it
//! returns `None` without inspecting input.

mod destructive;
mod exfiltration;
mod input;
mod ledger;
mod purchase;
mod sanitization;
mod secrets;
mod website;

pub use destructive::DestructiveDetector;
pub use exfiltration::ExfiltrationDetector;
pub use ledger::{ExceededLimit, SpendCheck, SpendLedger, SPEND_WINDOW_MS};
pub use purchase::PurchaseDetector;
pub use sanitization::{
    InjectionCategory, InjectionMatch, InjectionScanner, sanitize_matches,
};
pub use secrets::{SecretMatch, SecretScanner, SecretsDetector};
pub use website::WebsiteDetector;

use std::sync::Arc;

use clawsec_config::RulesConfig;
use clawsec_patterns::PatternError;
use clawsec_types::{Action, Detection, ToolCallContext};
use thiserror::Error;

/// One category detector.
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect one call; `None` means no signal.
    ///
    /// Implementations must tolerate arbitrary input shapes: an
    /// unexpected shape is "no match", never a crash.
    fn detect(&self, ctx: &ToolCallContext) -> Option<Detection>;
}

/// A detector paired with the action its rule maps a hit to.
pub struct RuleDetector {
    pub detector: Box<dyn Detector>,
    pub action: Action,
}

#[derive(Debug, Error)]
pub enum DetectorBuildError {
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Build the input-path detector registry from the rules config.
///
/// Sanitization is output-path only and is not registered here; the
/// output filter drives [`InjectionScanner`] directly.
pub fn build_input_detectors(
    rules: &RulesConfig,
    ledger: Arc<SpendLedger>,
) -> Result<Vec<RuleDetector>, DetectorBuildError> {
    let mut detectors = Vec::with_capacity(5);

    detectors.push(RuleDetector {
        detector: Box::new(PurchaseDetector::new(&rules.purchase, ledger)?),
        action: rules.purchase.action,
    });
    detectors.push(RuleDetector {
        detector: Box::new(WebsiteDetector::new(&rules.website)?),
        action: rules.website.action,
    });
    detectors.push(RuleDetector {
        detector: Box::new(DestructiveDetector::new(&rules.destructive)),
        action: rules.destructive.action,
    });
    detectors.push(RuleDetector {
        detector: Box::new(SecretsDetector::new(&rules.secrets)),
        action: rules.secrets.action,
    });
    detectors.push(RuleDetector {
        detector: Box::new(ExfiltrationDetector::new(&rules.exfiltration)),
        action: rules.exfiltration.action,
    });

    Ok(detectors)
}

/// Combined confidence for `n` triggering sub-detectors within one
/// category: `min(0.99, c1 + 0.05 * (n - 1))` where `c1` is the highest
/// sub-confidence.
#[must_use]
pub fn combined_confidence(highest: f64, triggered: usize) -> f64 {
    if triggered == 0 {
        return 0.0;
    }
    (highest + 0.05 * (triggered as f64 - 1.0)).min(0.99)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_confidence_formula() {
        assert!((combined_confidence(0.85, 1) - 0.85).abs() < 1e-9);
        assert!((combined_confidence(0.85, 2) - 0.90).abs() < 1e-9);
        assert!((combined_confidence(0.85, 3) - 0.95).abs() < 1e-9);
        // Capped at 0.99.
        assert!((combined_confidence(0.95, 3) - 0.99).abs() < 1e-9);
        assert!((combined_confidence(0.99, 5) - 0.99).abs() < 1e-9);
    }

    #[test]
    fn registry_contains_all_input_detectors() {
        let rules = RulesConfig::default();
        let detectors =
            build_input_detectors(&rules, Arc::new(SpendLedger::new())).unwrap();
        let names: Vec<&str> = detectors.iter().map(|d| d.detector.name()).collect();
        assert_eq!(
            names,
            ["purchase", "website", "destructive", "secrets", "exfiltration"]
        );
    }
}
