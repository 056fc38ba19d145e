//! Currency extraction from freeform values and text.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// The number shape shared by all forms: thousand separators and optional
/// decimal places. The comma form requires at least one separator group so
/// the plain form, not a 3-digit prefix, matches unseparated runs.
const NUMBER: &str = r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?";

struct CurrencyPatterns {
    labeled: Regex,
    symbol: Regex,
    suffixed: Regex,
    plain_decimal: Regex,
}

fn patterns() -> &'static CurrencyPatterns {
    static PATTERNS: OnceLock<CurrencyPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| CurrencyPatterns {
        labeled: Regex::new(&format!(
            r"(?i)\b(?:amount|price|(?:grand[_\s-]?)?total)\s*[:=]\s*(-?)[$€£¥]?\s*({NUMBER})"
        ))
        .expect("valid labeled currency regex"),
        symbol: Regex::new(&format!(r"(-?)[$€£¥]\s?({NUMBER})"))
            .expect("valid symbol currency regex"),
        suffixed: Regex::new(&format!(r"(?i)(-?)\b({NUMBER})\s?(?:USD|EUR|GBP)\b"))
            .expect("valid suffixed currency regex"),
        plain_decimal: Regex::new(r"(-?)\b(\d{1,3}(?:,\d{3})*\.\d{1,2}|\d+\.\d{1,2})\b")
            .expect("valid plain decimal regex"),
    })
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

fn first_non_negative(re: &Regex, text: &str) -> Option<f64> {
    for caps in re.captures_iter(text) {
        // A captured minus sign means a negative amount; skip it rather
        // than report the absolute value.
        if !caps[1].is_empty() {
            continue;
        }
        if let Some(value) = parse_number(&caps[2]) {
            return Some(value);
        }
    }
    None
}

/// Extract a monetary amount from freeform text.
///
/// Tries, in order: labeled forms (`amount=`, `price:`, `total=`,
/// `TOTAL:`), symbol-prefixed forms (`$1,299.99`), suffixed forms
/// (`25 USD|EUR|GBP`), then plain decimals (`99.99`). Negative amounts
/// yield `None`.
#[must_use]
pub fn extract_amount(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    let p = patterns();
    first_non_negative(&p.labeled, text)
        .or_else(|| first_non_negative(&p.symbol, text))
        .or_else(|| first_non_negative(&p.suffixed, text))
        .or_else(|| first_non_negative(&p.plain_decimal, text))
}

/// Extract a monetary amount from an arbitrary JSON value.
///
/// Numbers must be non-negative; strings go through [`extract_amount`].
/// Other shapes yield `None`.
#[must_use]
pub fn extract_amount_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => {
            let amount = n.as_f64()?;
            (amount >= 0.0).then_some(amount)
        }
        Value::String(s) => extract_amount(s),
        _ => None,
    }
}
