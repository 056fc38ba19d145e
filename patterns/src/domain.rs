//! Domain extraction and glob matching.
//!
//! Domain globs support `*` (any run of characters excluding `.`), `**`
//! (any run including `.`), and `?` (one character); every other regex
//! metacharacter is literal. Matching is case-insensitive and anchored to
//! the whole hostname.

use regex::Regex;
use url::Url;

use crate::PatternError;

/// Extract the lowercased hostname from a URL-ish string.
///
/// Inputs without a scheme are treated as `https://<input>`. A leading
/// `www.` label is stripped so `www.example.com` and `example.com` compare
/// equal. Invalid inputs return `None`.
#[must_use]
pub fn extract_domain(input: &str) -> Option<String> {
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
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() { None } else { Some(host) }
}

/// A compiled domain glob.
///
/// Patterns are normalized exactly like extracted hostnames (lowercased,
/// leading `www.` dropped), so `www.example.com` and `example.com`
/// configure the same match.
#[derive(Debug, Clone)]
pub struct DomainGlob {
    raw: String,
    regex: Regex,
    exact: bool,
}

impl DomainGlob {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let raw = pattern.trim().to_ascii_lowercase();
        let raw = raw.strip_prefix("www.").unwrap_or(&raw).to_string();
        let exact = !raw.contains(['*', '?']);
        let regex_src = glob_to_regex(&raw);
        let regex = Regex::new(&regex_src).map_err(|source| PatternError::InvalidPattern {
            pattern: raw.clone(),
            source,
        })?;
        Ok(Self { raw, regex, exact })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern contains no wildcards.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    #[must_use]
    pub fn matches(&self, domain: &str) -> bool {
        if self.exact {
            return self.raw.eq_ignore_ascii_case(domain);
        }
        self.regex.is_match(domain)
    }

    /// Number of literal (non-wildcard) `.`-separated labels in the pattern.
    ///
    /// `*.payments.example.com` has three literal labels; `**` has none.
    #[must_use]
    pub fn literal_labels(&self) -> usize {
        self.raw
            .split('.')
            .filter(|label| !label.is_empty() && !label.contains(['*', '?']))
            .count()
    }
}

/// Translate a domain glob into an anchored, case-insensitive regex.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push_str("(?i)^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^.]*");
                }
            }
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

/// How a domain matched a pattern list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainMatchKind {
    Exact,
    Wildcard,
}

/// A successful domain match with its confidence tier.
#[derive(Debug, Clone)]
pub struct DomainMatch {
    pub pattern: String,
    pub kind: DomainMatchKind,
    pub confidence: f64,
}

/// Confidence for an exact (wildcard-free) pattern hit.
const EXACT_CONFIDENCE: f64 = 0.95;

/// A list of domain globs with tiered match confidence.
///
/// Exact patterns are tried before wildcard patterns. Wildcard hits score
/// `0.95 + 0.01` per literal label of the pattern, capped at `0.99`, so a
/// more specific glob reports higher confidence than `**`.
#[derive(Debug, Clone, Default)]
pub struct DomainMatcher {
    exact: Vec<DomainGlob>,
    wildcard: Vec<DomainGlob>,
}

impl DomainMatcher {
    pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exact = Vec::new();
        let mut wildcard = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.trim().is_empty() {
                continue;
            }
            let glob = DomainGlob::new(pattern)?;
            if glob.is_exact() {
                exact.push(glob);
            } else {
                wildcard.push(glob);
            }
        }
        Ok(Self { exact, wildcard })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wildcard.is_empty()
    }

    #[must_use]
    pub fn match_domain(&self, domain: &str) -> Option<DomainMatch> {
        let domain = domain.trim().to_ascii_lowercase();
        if domain.is_empty() {
            return None;
        }

        for glob in &self.exact {
            if glob.matches(&domain) {
                return Some(DomainMatch {
                    pattern: glob.pattern().to_string(),
                    kind: DomainMatchKind::Exact,
                    confidence: EXACT_CONFIDENCE,
                });
            }
        }

        for glob in &self.wildcard {
            if glob.matches(&domain) {
                let confidence = (0.95 + 0.01 * glob.literal_labels() as f64).min(0.99);
                return Some(DomainMatch {
                    pattern: glob.pattern().to_string(),
                    kind: DomainMatchKind::Wildcard,
                    confidence,
                });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_domain_from_full_url() {
        assert_eq!(
            extract_domain("https://Shop.Example.com/checkout?x=1"),
            Some("shop.example.com".to_string())
        );
    }

    #[test]
    fn defaults_to_https_for_bare_hosts() {
        assert_eq!(
            extract_domain("example.com/path"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn strips_www_prefix() {
        assert_eq!(
            extract_domain("https://www.paypal.com"),
            Some("paypal.com".to_string())
        );
    }

    #[test]
    fn www_patterns_normalize_like_hostnames() {
        // A pattern configured with the www. label must still match,
        // because extracted hostnames never carry it.
        let glob = DomainGlob::new("www.example.com").unwrap();
        assert!(glob.matches("example.com"));
        assert!(glob.matches(&extract_domain("https://www.example.com").unwrap()));

        let matcher = DomainMatcher::new(["www.blocked.net"]).unwrap();
        let hit = matcher
            .match_domain(&extract_domain("https://www.blocked.net/x").unwrap())
            .unwrap();
        assert_eq!(hit.kind, DomainMatchKind::Exact);
        assert_eq!(hit.pattern, "blocked.net");
    }

    #[test]
    fn invalid_inputs_yield_none() {
        assert_eq!(extract_domain(""), None);
        assert_eq!(extract_domain("   "), None);
        assert_eq!(extract_domain("http://"), None);
        assert_eq!(extract_domain("not a url at all %%"), None);
    }

    #[test]
    fn single_star_does_not_cross_dots() {
        let glob = DomainGlob::new("*.example.com").unwrap();
        assert!(glob.matches("shop.example.com"));
        assert!(!glob.matches("a.b.example.com"));
        assert!(!glob.matches("example.com"));
    }

    #[test]
    fn double_star_crosses_dots() {
        let glob = DomainGlob::new("**.example.com").unwrap();
        assert!(glob.matches("shop.example.com"));
        assert!(glob.matches("a.b.example.com"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let glob = DomainGlob::new("examp?e.com").unwrap();
        assert!(glob.matches("example.com"));
        assert!(!glob.matches("exampllle.com"));
    }

    #[test]
    fn metacharacters_are_literal() {
        let glob = DomainGlob::new("ex+ample.com").unwrap();
        assert!(glob.matches("ex+ample.com"));
        assert!(!glob.matches("exxample.com"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let glob = DomainGlob::new("*.Example.COM").unwrap();
        assert!(glob.matches("shop.example.com"));
        let exact = DomainGlob::new("Example.com").unwrap();
        assert!(exact.matches("EXAMPLE.COM"));
    }

    #[test]
    fn matching_is_anchored() {
        let glob = DomainGlob::new("example.com").unwrap();
        assert!(!glob.matches("notexample.com"));
        assert!(!glob.matches("example.com.evil.net"));
    }

    #[test]
    fn exact_match_reports_exact_kind() {
        let matcher = DomainMatcher::new(["paypal.com", "*.stripe.com"]).unwrap();
        let hit = matcher.match_domain("paypal.com").unwrap();
        assert_eq!(hit.kind, DomainMatchKind::Exact);
        assert!((hit.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn wildcard_confidence_scales_with_specificity() {
        let matcher = DomainMatcher::new(["**"]).unwrap();
        let broad = matcher.match_domain("anything.com").unwrap().confidence;

        let matcher = DomainMatcher::new(["*.payments.example.com"]).unwrap();
        let narrow = matcher
            .match_domain("api.payments.example.com")
            .unwrap()
            .confidence;

        assert!(narrow > broad);
        assert!(narrow <= 0.99);
    }

    #[test]
    fn empty_patterns_are_skipped() {
        let matcher = DomainMatcher::new(["", "  ", "example.com"]).unwrap();
        assert!(matcher.match_domain("example.com").is_some());
        assert!(matcher.match_domain("other.com").is_none());
    }
}
