//! Prompt-injection scanning over tool outputs.
//!
//! Four signal categories, each individually toggleable and gated by a
//! configurable minimum confidence. The scanner only reports spans;
//! blocking versus redacting is the output filter's call.

use regex::Regex;
use std::sync::OnceLock;

use clawsec_config::SanitizationRule;

/// The four injection signal families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectionCategory {
    InstructionOverride,
    SystemLeak,
    Jailbreak,
    EncodedPayload,
}

impl InjectionCategory {
    /// Wire/metadata name (matches the config keys).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InstructionOverride => "instructionOverride",
            Self::SystemLeak => "systemLeak",
            Self::Jailbreak => "jailbreak",
            Self::EncodedPayload => "encodedPayload",
        }
    }
}

/// One matched injection span.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionMatch {
    pub category: InjectionCategory,
    pub confidence: f64,
    pub start: usize,
    pub end: usize,
}

struct InjectionPattern {
    category: InjectionCategory,
    confidence: f64,
    regex: Regex,
}

fn patterns() -> &'static [InjectionPattern] {
    static PATTERNS: OnceLock<Vec<InjectionPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let table: &[(InjectionCategory, f64, &str)] = &[
            // Instruction override
            (
                InjectionCategory::InstructionOverride,
                0.9,
                r"(?i)\bignore\s+(?:all\s+|any\s+)?(?:previous|prior|above|earlier)\s+instructions\b",
            ),
            (
                InjectionCategory::InstructionOverride,
                0.85,
                r"(?i)\bdisregard\s+(?:all\s+|any\s+)?(?:previous|prior|your)\s+(?:instructions|rules|guidelines)\b",
            ),
            (
                InjectionCategory::InstructionOverride,
                0.8,
                r"(?i)\bforget\s+(?:everything|all\s+previous\s+instructions)\b",
            ),
            (
                InjectionCategory::InstructionOverride,
                0.75,
                r"(?i)\bnew\s+instructions\s*:",
            ),
            (
                InjectionCategory::InstructionOverride,
                0.6,
                r"(?i)\byou\s+must\s+now\b",
            ),
            (
                InjectionCategory::InstructionOverride,
                0.6,
                r"(?i)\bfrom\s+now\s+on,?\s+you\b",
            ),
            // System prompt leak
            (
                InjectionCategory::SystemLeak,
                0.9,
                r"(?i)\b(?:reveal|show|print|repeat|output)\b[^.\n]{0,40}\bsystem\s+prompt\b",
            ),
            (
                InjectionCategory::SystemLeak,
                0.7,
                r"(?i)\bwhat\s+are\s+your\s+(?:instructions|rules)\b",
            ),
            (
                InjectionCategory::SystemLeak,
                0.8,
                r"(?i)\brepeat\s+the\s+text\s+above\b",
            ),
            (
                InjectionCategory::SystemLeak,
                0.8,
                r"(?i)\byour\s+hidden\s+(?:prompt|instructions)\b",
            ),
            // Jailbreak
            (InjectionCategory::Jailbreak, 0.85, r"(?i)\bDAN\s+mode\b"),
            (
                InjectionCategory::Jailbreak,
                0.7,
                r"(?i)\bdeveloper\s+mode\b",
            ),
            (
                InjectionCategory::Jailbreak,
                0.85,
                r"(?i)\bpretend\s+(?:you\s+(?:are|have)\s+no|there\s+are\s+no)\s+(?:restrictions|rules|guidelines)\b",
            ),
            (
                InjectionCategory::Jailbreak,
                0.8,
                r"(?i)\bact\s+as\s+an?\s+unrestricted\b",
            ),
            (InjectionCategory::Jailbreak, 0.75, r"(?i)\bjailbreak\b"),
            (
                InjectionCategory::Jailbreak,
                0.7,
                r"(?i)\bwithout\s+any\s+(?:filters|restrictions|censorship)\b",
            ),
            // Encoded payloads
            (
                InjectionCategory::EncodedPayload,
                0.6,
                r"[A-Za-z0-9+/]{60,}={0,2}",
            ),
            (
                InjectionCategory::EncodedPayload,
                0.8,
                r"(?:\\x[0-9a-fA-F]{2}){10,}",
            ),
            (
                InjectionCategory::EncodedPayload,
                0.8,
                r"(?:\\u[0-9a-fA-F]{4}){8,}",
            ),
            (
                InjectionCategory::EncodedPayload,
                0.85,
                r"(?i)data:text/[a-z]+;base64,",
            ),
        ];

        table
            .iter()
            .map(|&(category, confidence, pattern)| InjectionPattern {
                category,
                confidence,
                regex: Regex::new(pattern).expect("valid injection regex"),
            })
            .collect()
    })
}

/// Scans text for prompt-injection signals under one rule configuration.
#[derive(Debug, Clone)]
pub struct InjectionScanner {
    min_confidence: f64,
    instruction_override: bool,
    system_leak: bool,
    jailbreak: bool,
    encoded_payload: bool,
}

impl InjectionScanner {
    #[must_use]
    pub fn new(rule: &SanitizationRule) -> Self {
        Self {
            min_confidence: rule.min_confidence,
            instruction_override: rule.categories.instruction_override,
            system_leak: rule.categories.system_leak,
            jailbreak: rule.categories.jailbreak,
            encoded_payload: rule.categories.encoded_payload,
        }
    }

    fn category_enabled(&self, category: InjectionCategory) -> bool {
        match category {
            InjectionCategory::InstructionOverride => self.instruction_override,
            InjectionCategory::SystemLeak => self.system_leak,
            InjectionCategory::Jailbreak => self.jailbreak,
            InjectionCategory::EncodedPayload => self.encoded_payload,
        }
    }

    /// All matches at or above the configured confidence floor, in
    /// ascending span order.
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<InjectionMatch> {
        let mut matches: Vec<InjectionMatch> = Vec::new();
        for pattern in patterns() {
            if pattern.confidence < self.min_confidence
                || !self.category_enabled(pattern.category)
            {
                continue;
            }
            for found in pattern.regex.find_iter(text) {
                matches.push(InjectionMatch {
                    category: pattern.category,
                    confidence: pattern.confidence,
                    start: found.start(),
                    end: found.end(),
                });
            }
        }
        matches.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        matches
    }

    /// Highest-confidence match, if any.
    #[must_use]
    pub fn strongest(&self, text: &str) -> Option<InjectionMatch> {
        self.scan(text)
            .into_iter()
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

/// Return a copy of `text` with every matched span replaced by
/// `[FILTERED]`. Overlapping spans are collapsed into one marker.
#[must_use]
pub fn sanitize_matches(text: &str, matches: &[InjectionMatch]) -> String {
    if matches.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for m in matches {
        if m.start < cursor {
            // Overlaps a span already replaced.
            cursor = cursor.max(m.end);
            continue;
        }
        out.push_str(&text[cursor..m.start]);
        out.push_str("[FILTERED]");
        cursor = m.end;
    }
    out.push_str(&text[cursor.min(text.len())..]);
    out
}
