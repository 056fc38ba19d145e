//! Normalized view of one tool invocation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Pre-execution description of a tool call, normalized for the detectors.
///
/// Created once per request and immutable for the lifetime of one
/// evaluation. `tool_input` is a freeform mapping; traversals must tolerate
/// unknown shapes and yield "no match" rather than fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallContext {
    pub tool_name: String,
    pub tool_input: Map<String, Value>,
    /// Hoisted from `tool_input.url` when that value is a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Only present on the output-filter path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<String>,
}

impl ToolCallContext {
    #[must_use]
    pub fn new(tool_name: impl Into<String>, tool_input: Map<String, Value>) -> Self {
        let url = tool_input
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            tool_name: tool_name.into(),
            tool_input,
            url,
            tool_output: None,
        }
    }

    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.tool_output = Some(output.into());
        self
    }

    /// String value of a top-level input key, if present.
    #[must_use]
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.tool_input.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn hoists_url_from_input() {
        let ctx = ToolCallContext::new(
            "browser_navigate",
            map(json!({"url": "https://example.com"})),
        );
        assert_eq!(ctx.url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn non_string_url_is_not_hoisted() {
        let ctx = ToolCallContext::new("browser_navigate", map(json!({"url": 42})));
        assert_eq!(ctx.url, None);
    }

    #[test]
    fn input_str_tolerates_missing_keys() {
        let ctx = ToolCallContext::new("Bash", map(json!({"command": "ls"})));
        assert_eq!(ctx.input_str("command"), Some("ls"));
        assert_eq!(ctx.input_str("script"), None);
    }
}
