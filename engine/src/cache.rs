//! Analyzer result cache.
//!
//! Short-circuits repeated identical contexts within a short TTL. Never
//! correctness-bearing: a miss (or a failure to cache) only costs another
//! detector pass.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

use clawsec_types::{AnalysisResult, now_ms};
use serde_json::{Map, Value};

/// Default entry lifetime.
pub const DEFAULT_TTL_MS: i64 = 5_000;

/// Prune pass threshold; eviction is piggybacked on inserts.
const PRUNE_AT: usize = 256;

struct CacheEntry {
    inserted_at: i64,
    result: AnalysisResult,
}

pub struct AnalysisCache {
    ttl_ms: i64,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_MS)
    }
}

impl AnalysisCache {
    #[must_use]
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            ttl_ms,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Stable fingerprint for a (tool name, input) pair.
    ///
    /// The input is serialized with object keys sorted at every level so
    /// two maps with different insertion orders fingerprint identically.
    #[must_use]
    pub fn fingerprint(tool_name: &str, tool_input: &Map<String, Value>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(tool_name.as_bytes());
        hasher.update([0u8]);
        let mut canonical = String::new();
        write_canonical(&Value::Object(tool_input.clone()), &mut canonical);
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[must_use]
    pub fn get(&self, fingerprint: &str) -> Option<AnalysisResult> {
        let now = now_ms();
        let entries = self.entries.lock().expect("analysis cache lock");
        let entry = entries.get(fingerprint)?;
        if now - entry.inserted_at > self.ttl_ms {
            return None;
        }
        let mut result = entry.result.clone();
        result.cached = true;
        Some(result)
    }

    pub fn put(&self, fingerprint: String, result: AnalysisResult) {
        let now = now_ms();
        let mut entries = self.entries.lock().expect("analysis cache lock");
        if entries.len() >= PRUNE_AT {
            entries.retain(|_, e| now - e.inserted_at <= self.ttl_ms);
        }
        entries.insert(
            fingerprint,
            CacheEntry {
                inserted_at: now,
                result,
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().expect("analysis cache lock").clear();
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
