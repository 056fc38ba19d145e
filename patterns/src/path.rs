//! URL payment-path classification.
//!
//! A `RegexSet` over checkout-style path shapes; one pass per URL.

use regex::RegexSet;
use url::Url;

/// Path patterns that indicate a purchase or payment flow.
///
/// Each tuple: `(regex_pattern, label)`. The label lands in detection
/// metadata as `matchedPattern`.
const PAYMENT_PATH_PATTERNS: &[(&str, &str)] = &[
    (r"(?i)^/checkout(/|$)", "/checkout"),
    (r"(?i)^/pay(/|$)", "/pay"),
    (r"(?i)^/payments?(/|$)", "/payment"),
    (r"(?i)^/buy(/|$)", "/buy"),
    (r"(?i)^/purchase(/|$)", "/purchase"),
    (r"(?i)^/orders?(/|$)", "/order"),
    (r"(?i)^/subscribe(/|$)", "/subscribe"),
    (r"(?i)^/subscription(/|$)", "/subscription"),
    (r"(?i)^/billing(/|$)", "/billing"),
    (r"(?i)^/upgrade(/|$)", "/upgrade"),
    // API variants: /api/checkout, /api/v2/payments, ...
    (
        r"(?i)^/api(/v?\d+)?/(checkout|pay|payments?|buy|purchase|orders?|subscribe|subscription|billing|upgrade)(/|$)",
        "/api payment endpoint",
    ),
];

/// Confidence for a payment-path hit; below a domain hit, above a single
/// form-field hit.
const PATH_CONFIDENCE: f64 = 0.85;

/// A successful payment-path match.
#[derive(Debug, Clone)]
pub struct PathMatch {
    pub pattern: &'static str,
    pub path: String,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct PaymentPathMatcher {
    set: RegexSet,
}

impl Default for PaymentPathMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentPathMatcher {
    #[must_use]
    pub fn new() -> Self {
        let patterns: Vec<&str> = PAYMENT_PATH_PATTERNS.iter().map(|(p, _)| *p).collect();
        let set = RegexSet::new(patterns).expect("valid payment path regexes");
        Self { set }
    }

    /// Match the path component of a URL-ish string.
    ///
    /// Inputs without a scheme are treated as `https://<input>` so
    /// `shop.com/checkout` still classifies.
    #[must_use]
    pub fn match_url(&self, input: &str) -> Option<PathMatch> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };
        let url = Url::parse(&candidate).ok()?;
        let path = url.path().to_string();

        let idx = self.set.matches(&path).iter().next()?;
        Some(PathMatch {
            pattern: PAYMENT_PATH_PATTERNS[idx].1,
            path,
            confidence: PATH_CONFIDENCE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> PaymentPathMatcher {
        PaymentPathMatcher::new()
    }

    #[test]
    fn matches_checkout_paths() {
        let m = matcher();
        assert!(m.match_url("https://shop.com/checkout").is_some());
        assert!(m.match_url("https://shop.com/checkout/review").is_some());
        assert!(m.match_url("https://shop.com/CHECKOUT").is_some());
    }

    #[test]
    fn matches_payment_variants() {
        let m = matcher();
        for path in [
            "/pay", "/payment", "/payments", "/buy", "/purchase", "/order", "/orders",
            "/subscribe", "/subscription", "/billing", "/upgrade",
        ] {
            assert!(
                m.match_url(&format!("https://shop.com{path}")).is_some(),
                "expected match for {path}"
            );
        }
    }

    #[test]
    fn matches_api_variants() {
        let m = matcher();
        assert!(m.match_url("https://shop.com/api/checkout").is_some());
        assert!(m.match_url("https://shop.com/api/v2/payments").is_some());
        assert!(m.match_url("https://shop.com/api/orders/123").is_some());
    }

    #[test]
    fn ignores_non_payment_paths() {
        let m = matcher();
        assert!(m.match_url("https://shop.com/products").is_none());
        assert!(m.match_url("https://shop.com/").is_none());
        // Substring of a longer segment is not a hit.
        assert!(m.match_url("https://shop.com/playground").is_none());
        assert!(m.match_url("https://shop.com/buyers-guide").is_none());
    }

    #[test]
    fn accepts_schemeless_urls() {
        let m = matcher();
        assert!(m.match_url("shop.com/checkout").is_some());
    }
}
