//! Traversal helpers over the freeform `tool_input` mapping.
//!
//! `tool_input` is a tagged value tree of unknown shape. Everything here
//! yields "nothing found" for shapes it does not understand.

use serde_json::{Map, Value};

use clawsec_types::ToolCallContext;

/// Top-level keys whose string values carry commands, scripts, or other
/// text worth scanning.
pub(crate) const SCANNED_INPUT_KEYS: &[&str] = &[
    "command", "query", "script", "code", "content", "bash", "path",
];

/// Nesting cap for recursive traversals; beyond this the value is ignored.
const MAX_DEPTH: usize = 8;

/// String values at the scanned top-level keys, in key order.
pub(crate) fn scannable_fields(ctx: &ToolCallContext) -> Vec<(&'static str, &str)> {
    SCANNED_INPUT_KEYS
        .iter()
        .filter_map(|key| ctx.input_str(key).map(|text| (*key, text)))
        .collect()
}

/// Every string anywhere in the input tree, including object keys' values
/// nested in arrays and objects.
pub(crate) fn collect_strings<'a>(input: &'a Map<String, Value>) -> Vec<&'a str> {
    let mut out = Vec::new();
    for value in input.values() {
        collect_value_strings(value, &mut out, 0);
    }
    out
}

fn collect_value_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>, depth: usize) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => {
            for item in items {
                collect_value_strings(item, out, depth + 1);
            }
        }
        Value::Object(map) => {
            for nested in map.values() {
                collect_value_strings(nested, out, depth + 1);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> ToolCallContext {
        ToolCallContext::new("Bash", value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn scannable_fields_picks_known_keys() {
        let ctx = ctx(json!({"command": "ls", "cwd": "/tmp", "script": "echo hi"}));
        let fields = scannable_fields(&ctx);
        assert_eq!(fields, vec![("command", "ls"), ("script", "echo hi")]);
    }

    #[test]
    fn scannable_fields_ignores_non_strings() {
        let ctx = ctx(json!({"command": ["rm"], "code": 42}));
        assert!(scannable_fields(&ctx).is_empty());
    }

    #[test]
    fn collect_strings_walks_nested_shapes() {
        let input = json!({
            "a": "one",
            "b": {"c": "two", "d": [{"e": "three"}, 4, null]},
        });
        let map = input.as_object().unwrap();
        let mut strings = collect_strings(map);
        strings.sort_unstable();
        assert_eq!(strings, vec!["one", "three", "two"]);
    }

    #[test]
    fn collect_strings_stops_at_depth_cap() {
        // Build a value nested far beyond the cap.
        let mut value = json!("leaf");
        for _ in 0..20 {
            value = json!({ "inner": value });
        }
        let input = json!({ "root": value });
        let strings = collect_strings(input.as_object().unwrap());
        assert!(strings.is_empty());
    }
}
