//! Purchase detection: payment domains, checkout paths, payment form
//! fields, and spend-limit enforcement.

use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use url::Url;

use clawsec_config::{DomainListMode, PurchaseRule, SpendLimits};
use clawsec_patterns::{
    DomainMatcher, PaymentPathMatcher, extract_amount, extract_domain,
};
use clawsec_types::{Detection, Severity, ThreatCategory, ToolCallContext};

use crate::ledger::SpendLedger;
use crate::input::scannable_fields;
use crate::{Detector, DetectorBuildError, combined_confidence};

/// Payment processors, gateways, and marketplaces always consulted,
/// regardless of user configuration.
const BUILTIN_PAYMENT_DOMAINS: &[&str] = &[
    // Processors and gateways
    "stripe.com",
    "checkout.stripe.com",
    "paypal.com",
    "braintreepayments.com",
    "adyen.com",
    "squareup.com",
    "square.com",
    "checkout.com",
    "worldpay.com",
    "authorize.net",
    "2checkout.com",
    "payu.com",
    "mollie.com",
    // Buy-now-pay-later and wallets
    "klarna.com",
    "affirm.com",
    "afterpay.com",
    "venmo.com",
    "cash.app",
    "wise.com",
    "payoneer.com",
    "pay.google.com",
    // Marketplaces
    "amazon.com",
    "ebay.com",
    "etsy.com",
    "aliexpress.com",
    "walmart.com",
    "bestbuy.com",
    "shop.app",
];

/// Hostname keywords that suggest a payment flow without naming a known
/// processor.
const PAYMENT_KEYWORDS: &[&str] = &[
    "pay", "payment", "checkout", "billing", "purchase", "buy", "shop", "store", "order",
    "cart", "wallet",
];

/// Normalized substrings that mark an input field as payment-related.
const PAYMENT_FIELD_MARKERS: &[&str] = &[
    "card",
    "cvv",
    "cvc",
    "expiry",
    "expmonth",
    "expyear",
    "securitycode",
    "billing",
    "routing",
    "iban",
    "bankaccount",
    "paymentmethod",
    "paymenttype",
];

struct FormPatterns {
    pan: Regex,
    cvv: Regex,
    expiry: Regex,
}

fn form_patterns() -> &'static FormPatterns {
    static PATTERNS: OnceLock<FormPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| FormPatterns {
        // 13-19 digits with optional space/dash separators.
        pan: Regex::new(r"\b\d(?:[ -]?\d){12,18}\b").expect("valid PAN regex"),
        cvv: Regex::new(r"(?i)\b(?:cvv|cvc|security\s*code)\s*[:=]?\s*\d{3,4}\b")
            .expect("valid CVV regex"),
        expiry: Regex::new(r"\b(?:0[1-9]|1[0-2])\s*/\s*(?:\d{2}|\d{4})\b")
            .expect("valid expiry regex"),
    })
}

/// One sub-detector hit, before combination.
struct SubHit {
    kind: &'static str,
    confidence: f64,
    reason: String,
    metadata: Map<String, Value>,
}

pub struct PurchaseDetector {
    enabled: bool,
    severity: Severity,
    mode: DomainListMode,
    builtin: DomainMatcher,
    configured: DomainMatcher,
    paths: PaymentPathMatcher,
    spend_limits: Option<SpendLimits>,
    ledger: Arc<SpendLedger>,
}

impl PurchaseDetector {
    pub fn new(rule: &PurchaseRule, ledger: Arc<SpendLedger>) -> Result<Self, DetectorBuildError> {
        Ok(Self {
            enabled: rule.enabled,
            severity: rule.severity,
            mode: rule.domains.mode,
            builtin: DomainMatcher::new(BUILTIN_PAYMENT_DOMAINS.iter().copied())?,
            configured: DomainMatcher::new(rule.domains.blocklist.iter())?,
            paths: PaymentPathMatcher::new(),
            spend_limits: rule.spend_limits,
            ledger,
        })
    }

    fn detect_domain(&self, url: &str) -> Option<SubHit> {
        let domain = extract_domain(url)?;

        // In allowlist mode the configured list names trusted purchase
        // domains; a listed domain is exempt from the domain sub-detector.
        if self.mode == DomainListMode::Allowlist
            && self.configured.match_domain(&domain).is_some()
        {
            return None;
        }

        let hit = self.builtin.match_domain(&domain).or_else(|| {
            (self.mode == DomainListMode::Blocklist)
                .then(|| self.configured.match_domain(&domain))
                .flatten()
        });

        if let Some(hit) = hit {
            let mut metadata = Map::new();
            metadata.insert("domain".into(), domain.clone().into());
            metadata.insert("url".into(), url.into());
            metadata.insert("matchedPattern".into(), hit.pattern.into());
            metadata.insert("type".into(), "domain".into());
            return Some(SubHit {
                kind: "domain",
                confidence: hit.confidence,
                reason: format!("Payment domain detected: {domain}"),
                metadata,
            });
        }

        self.detect_domain_keywords(url, &domain)
    }

    fn detect_domain_keywords(&self, url: &str, domain: &str) -> Option<SubHit> {
        let labels: Vec<&str> = domain.split(['.', '-']).collect();
        let matched: Vec<&str> = PAYMENT_KEYWORDS
            .iter()
            .copied()
            .filter(|kw| domain.contains(kw))
            .collect();
        if matched.is_empty() {
            return None;
        }

        let whole_label = matched.iter().any(|kw| labels.contains(kw));
        let confidence = match (matched.len(), whole_label) {
            (1, false) => 0.55,
            (1, true) => 0.65,
            (_, _) => 0.75,
        };

        let mut metadata = Map::new();
        metadata.insert("domain".into(), domain.into());
        metadata.insert("url".into(), url.into());
        metadata.insert(
            "matchedPattern".into(),
            matched.join(",").into(),
        );
        metadata.insert("type".into(), "domain".into());
        Some(SubHit {
            kind: "domain",
            confidence,
            reason: format!("Payment-related hostname: {domain}"),
            metadata,
        })
    }

    fn detect_path(&self, url: &str) -> Option<SubHit> {
        let hit = self.paths.match_url(url)?;
        let mut metadata = Map::new();
        metadata.insert("url".into(), url.into());
        metadata.insert("matchedPattern".into(), hit.pattern.into());
        metadata.insert("type".into(), "url-path".into());
        Some(SubHit {
            kind: "url-path",
            confidence: hit.confidence,
            reason: format!("Payment URL path detected: {}", hit.path),
            metadata,
        })
    }

    fn detect_form(&self, ctx: &ToolCallContext) -> Option<SubHit> {
        let mut fields: Vec<String> = Vec::new();

        // (a) top-level keys of the input.
        for key in ctx.tool_input.keys() {
            if is_payment_field(key) {
                fields.push(key.clone());
            }
        }

        // (b) a `fields` array of {name, value} objects.
        if let Some(Value::Array(items)) = ctx.tool_input.get("fields") {
            for item in items {
                if let Some(name) = item.get("name").and_then(Value::as_str)
                    && is_payment_field(name)
                {
                    fields.push(name.to_string());
                }
            }
        }

        // (c) PAN / CVV / expiry shapes in free text.
        let patterns = form_patterns();
        let mut pan = false;
        let mut cvv = false;
        let mut expiry = false;
        for (_, text) in scannable_fields(ctx) {
            pan |= patterns.pan.is_match(text);
            cvv |= patterns.cvv.is_match(text);
            expiry |= patterns.expiry.is_match(text);
        }

        fields.sort_unstable();
        fields.dedup();

        let mut indicators = fields.len();
        for flag in [pan, cvv, expiry] {
            indicators += usize::from(flag);
        }
        if indicators == 0 {
            return None;
        }

        let confidence = match indicators {
            1 => 0.75,
            2 => 0.82,
            _ => 0.92,
        };

        let mut metadata = Map::new();
        if !fields.is_empty() {
            metadata.insert(
                "formFields".into(),
                Value::Array(fields.iter().cloned().map(Value::String).collect()),
            );
        }
        if pan {
            metadata.insert("panDetected".into(), true.into());
        }
        metadata.insert("type".into(), "form".into());

        let reason = if fields.is_empty() {
            "Payment card data detected in tool input".to_string()
        } else {
            format!("Payment form fields detected: {}", fields.join(", "))
        };

        Some(SubHit {
            kind: "form",
            confidence,
            reason,
            metadata,
        })
    }

    /// Best-effort amount extraction per the spend-limit contract: known
    /// top-level keys, URL query parameters, nested containers, the
    /// `fields` array, then free-text currency.
    fn extract_amount(&self, ctx: &ToolCallContext) -> Option<f64> {
        const AMOUNT_KEYS: &[&str] = &["amount", "price", "total", "grandTotal"];

        for key in AMOUNT_KEYS {
            if let Some(value) = ctx.tool_input.get(*key)
                && let Some(amount) = clawsec_patterns::extract_amount_from_value(value)
            {
                return Some(amount);
            }
        }

        if let Some(url) = ctx.url.as_deref()
            && let Ok(parsed) = Url::parse(url)
        {
            for (key, value) in parsed.query_pairs() {
                if AMOUNT_KEYS.iter().any(|k| k.eq_ignore_ascii_case(&key))
                    && let Some(amount) =
                        extract_amount(&value).or_else(|| value.parse::<f64>().ok().filter(|a| *a >= 0.0))
                {
                    return Some(amount);
                }
            }
        }

        for container in ["data", "body", "formData"] {
            if let Some(Value::Object(nested)) = ctx.tool_input.get(container) {
                for key in AMOUNT_KEYS {
                    if let Some(value) = nested.get(*key)
                        && let Some(amount) = clawsec_patterns::extract_amount_from_value(value)
                    {
                        return Some(amount);
                    }
                }
            }
        }

        if let Some(Value::Array(items)) = ctx.tool_input.get("fields") {
            for item in items {
                if let Some(name) = item.get("name").and_then(Value::as_str)
                    && AMOUNT_KEYS.iter().any(|k| k.eq_ignore_ascii_case(name))
                    && let Some(value) = item.get("value")
                    && let Some(amount) = clawsec_patterns::extract_amount_from_value(value)
                {
                    return Some(amount);
                }
            }
        }

        for (_, text) in scannable_fields(ctx) {
            if let Some(amount) = extract_amount(text) {
                return Some(amount);
            }
        }

        None
    }

    fn apply_spend_limits(&self, ctx: &ToolCallContext, detection: &mut Detection) {
        let Some(limits) = &self.spend_limits else {
            return;
        };

        // No extractable amount: assume the per-transaction limit, the
        // worst case that still passes the per-transaction check.
        let amount = self.extract_amount(ctx).unwrap_or(limits.per_transaction);
        let check = self.ledger.check(amount, limits);

        detection.metadata.insert("amount".into(), amount.into());
        detection.metadata.insert(
            "currentDailyTotal".into(),
            check.current_daily_total.into(),
        );

        if let Some(exceeded) = check.exceeded {
            tracing::warn!(
                amount,
                current_daily_total = check.current_daily_total,
                limit = exceeded.as_str(),
                "spend limit exceeded"
            );
            detection
                .metadata
                .insert("exceededLimit".into(), exceeded.as_str().into());
            let suffix = match exceeded {
                crate::ledger::ExceededLimit::PerTransaction => format!(
                    " Amount {amount:.2} exceeds the per-transaction limit of {:.2}.",
                    limits.per_transaction
                ),
                crate::ledger::ExceededLimit::Daily => format!(
                    " Daily spend {:.2} plus {amount:.2} exceeds the daily limit of {:.2}.",
                    check.current_daily_total, limits.daily
                ),
            };
            detection.reason.push_str(&suffix);
        }
    }
}

impl Detector for PurchaseDetector {
    fn name(&self) -> &'static str {
        "purchase"
    }

    fn detect(&self, ctx: &ToolCallContext) -> Option<Detection> {
        if !self.enabled {
            return None;
        }

        let mut hits: Vec<SubHit> = Vec::new();
        if let Some(url) = ctx.url.as_deref() {
            hits.extend(self.detect_domain(url));
            hits.extend(self.detect_path(url));
        }
        hits.extend(self.detect_form(ctx));

        if hits.is_empty() {
            return None;
        }

        // Primary is the highest-confidence sub-result (first on ties).
        let primary_idx = hits
            .iter()
            .enumerate()
            .max_by(|(ai, a), (bi, b)| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(bi.cmp(ai))
            })
            .map(|(i, _)| i)?;

        let confidence = combined_confidence(hits[primary_idx].confidence, hits.len());
        let reason = hits[primary_idx].reason.clone();

        let mut metadata = Map::new();
        for hit in &hits {
            for (key, value) in &hit.metadata {
                merge_metadata(&mut metadata, key, value);
            }
        }
        // The primary sub-detector names the overall type.
        metadata.insert("type".into(), hits[primary_idx].kind.into());

        let mut detection =
            Detection::new(ThreatCategory::Purchase, self.severity, confidence, reason);
        detection.metadata = metadata;

        self.apply_spend_limits(ctx, &mut detection);

        Some(detection)
    }
}

fn is_payment_field(name: &str) -> bool {
    let normalized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    PAYMENT_FIELD_MARKERS
        .iter()
        .any(|marker| normalized.contains(marker))
}

/// Union metadata across sub-results; `formFields` arrays are merged and
/// deduplicated instead of overwritten.
fn merge_metadata(metadata: &mut Map<String, Value>, key: &str, value: &Value) {
    if key == "formFields"
        && let (Some(Value::Array(existing)), Value::Array(new)) =
            (metadata.get_mut(key), value)
    {
        for item in new {
            if !existing.contains(item) {
                existing.push(item.clone());
            }
        }
        return;
    }
    metadata.entry(key.to_string()).or_insert_with(|| value.clone());
}
