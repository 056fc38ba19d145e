//! Website detection: blocklist/allowlist verdicts plus built-in domain
//! category families.

use clawsec_config::{DomainListMode, WebsiteRule};
use clawsec_patterns::{DomainMatcher, extract_domain};
use clawsec_types::{Detection, Severity, ThreatCategory, ToolCallContext};

use crate::{Detector, DetectorBuildError};

/// A built-in glob family classifying a domain into a category.
struct CategoryFamily {
    name: &'static str,
    severity: Severity,
    patterns: &'static [&'static str],
}

/// Dangerous categories force severity `critical`; warning categories
/// force `medium`. A category hit overrides the mode verdict when its
/// severity is higher.
const CATEGORY_FAMILIES: &[CategoryFamily] = &[
    CategoryFamily {
        name: "malware",
        severity: Severity::Critical,
        patterns: &[
            "**crack**",
            "**keygen**",
            "**warez**",
            "**malware**",
            "**trojan**",
            // Suspicious free TLDs favored by drive-by campaigns.
            "**.tk",
            "**.ml",
            "**.ga",
            "**.cf",
            "**.gq",
        ],
    },
    CategoryFamily {
        name: "phishing",
        severity: Severity::Critical,
        patterns: &[
            "**phish**",
            "**account-verify**",
            "**verify-account**",
            "**signin-**",
            "**login-secure**",
            "**secure-login**",
            // Punycode and digit-for-letter homographs.
            "xn--**",
            "**paypa1**",
            "**g00gle**",
            "**micros0ft**",
            "**amaz0n**",
        ],
    },
    CategoryFamily {
        name: "gambling",
        severity: Severity::Medium,
        patterns: &[
            "**casino**",
            "**poker**",
            "**betting**",
            "**slots**",
            "**roulette**",
            "**blackjack**",
            "**lottery**",
        ],
    },
    CategoryFamily {
        name: "adult",
        severity: Severity::Medium,
        patterns: &["**porn**", "**xxx**", "**nsfw**", "**escort**"],
    },
];

/// Confidence when the allowlist is empty and everything is blocked.
const EMPTY_ALLOWLIST_CONFIDENCE: f64 = 0.99;

/// Confidence for "domain not in allowlist".
const NOT_ALLOWLISTED_CONFIDENCE: f64 = 0.95;

pub struct WebsiteDetector {
    enabled: bool,
    mode: DomainListMode,
    severity: Severity,
    blocklist: DomainMatcher,
    allowlist: DomainMatcher,
    categories: Vec<(&'static CategoryFamily, DomainMatcher)>,
}

impl WebsiteDetector {
    pub fn new(rule: &WebsiteRule) -> Result<Self, DetectorBuildError> {
        let categories = CATEGORY_FAMILIES
            .iter()
            .map(|family| {
                DomainMatcher::new(family.patterns.iter().copied()).map(|m| (family, m))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            enabled: rule.enabled,
            mode: rule.mode,
            severity: rule.severity,
            blocklist: DomainMatcher::new(rule.blocklist.iter())?,
            allowlist: DomainMatcher::new(rule.allowlist.iter())?,
            categories,
        })
    }

    fn mode_verdict(&self, url: &str, domain: &str) -> Option<Detection> {
        match self.mode {
            DomainListMode::Blocklist => {
                let hit = self.blocklist.match_domain(domain)?;
                Some(
                    Detection::new(
                        ThreatCategory::Website,
                        self.severity,
                        hit.confidence,
                        format!("Domain is blocklisted: {domain}"),
                    )
                    .with_meta("domain", domain)
                    .with_meta("url", url)
                    .with_meta("matchedPattern", hit.pattern),
                )
            }
            DomainListMode::Allowlist => {
                if self.allowlist.is_empty() {
                    return Some(
                        Detection::new(
                            ThreatCategory::Website,
                            self.severity,
                            EMPTY_ALLOWLIST_CONFIDENCE,
                            format!(
                                "Allowlist mode with an empty allowlist blocks all domains: {domain}"
                            ),
                        )
                        .with_meta("domain", domain)
                        .with_meta("url", url),
                    );
                }
                if self.allowlist.match_domain(domain).is_some() {
                    return None;
                }
                Some(
                    Detection::new(
                        ThreatCategory::Website,
                        self.severity,
                        NOT_ALLOWLISTED_CONFIDENCE,
                        format!("Domain is not in the allowlist: {domain}"),
                    )
                    .with_meta("domain", domain)
                    .with_meta("url", url),
                )
            }
        }
    }

    fn category_verdict(&self, url: &str, domain: &str) -> Option<Detection> {
        for (family, matcher) in &self.categories {
            if let Some(hit) = matcher.match_domain(domain) {
                return Some(
                    Detection::new(
                        ThreatCategory::Website,
                        family.severity,
                        hit.confidence,
                        format!("Domain categorized as {}: {domain}", family.name),
                    )
                    .with_meta("domain", domain)
                    .with_meta("url", url)
                    .with_meta("category", family.name)
                    .with_meta("matchedPattern", hit.pattern),
                );
            }
        }
        None
    }
}

impl Detector for WebsiteDetector {
    fn name(&self) -> &'static str {
        "website"
    }

    fn detect(&self, ctx: &ToolCallContext) -> Option<Detection> {
        if !self.enabled {
            return None;
        }
        let url = ctx.url.as_deref()?;
        let domain = extract_domain(url)?;

        let mode = self.mode_verdict(url, &domain);
        let category = self.category_verdict(url, &domain);

        match (mode, category) {
            (Some(mode), Some(category)) => {
                if category.severity > mode.severity {
                    Some(category)
                } else {
                    Some(mode)
                }
            }
            (verdict, None) | (None, verdict) => verdict,
        }
    }
}
