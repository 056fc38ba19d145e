//! The external webhook transport: synchronous decisions over HTTP plus
//! an asynchronous callback path.
//!
//! Failures never transition the approval record; it stays `pending`
//! until it expires or another transport acts.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use clawsec_config::WebhookApprovalConfig;
use clawsec_types::{ApprovalStatus, Detection, PendingApprovalRecord, now_ms};

use crate::approval::native::ApprovalOutcome;
use crate::approval::store::PendingApprovalStore;

/// Outgoing approval request payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    id: &'a str,
    detection: &'a Detection,
    tool_call: ToolCallPayload<'a>,
    timestamp: i64,
    expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ToolCallPayload<'a> {
    name: &'a str,
    input: &'a Map<String, Value>,
}

/// What the webhook decided (or failed to decide).
#[derive(Debug, Clone, Default)]
pub struct WebhookDecision {
    pub success: bool,
    pub approved: Option<bool>,
    pub approved_by: Option<String>,
    pub reason: Option<String>,
    pub waiting_for_callback: bool,
    pub error: Option<String>,
}

impl WebhookDecision {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Body of an asynchronous callback.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub approved: bool,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub struct WebhookTransport {
    client: reqwest::Client,
    config: WebhookApprovalConfig,
    store: Arc<PendingApprovalStore>,
}

impl WebhookTransport {
    #[must_use]
    pub fn new(config: WebhookApprovalConfig, store: Arc<PendingApprovalStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            store,
        }
    }

    /// POST the approval request and interpret the response.
    ///
    /// * 200 with `{approved: bool, ...}` — synchronous decision, applied
    ///   to the store immediately.
    /// * 202 — the webhook will call back later; the record stays pending.
    /// * anything else — a typed error; the store is untouched.
    pub async fn request_approval(&self, record: &PendingApprovalRecord) -> WebhookDecision {
        let Some(url) = self.config.url.as_deref() else {
            return WebhookDecision::failure("Webhook URL is not configured");
        };

        let callback_url = self
            .config
            .callback_url_template
            .as_deref()
            .map(|template| template.replace("{id}", &record.id));

        let payload = WebhookPayload {
            id: &record.id,
            detection: &record.detection,
            tool_call: ToolCallPayload {
                name: &record.tool_call.tool_name,
                input: &record.tool_call.tool_input,
            },
            timestamp: now_ms(),
            expires_at: record.expires_at,
            callback_url,
        };

        let response = self
            .client
            .post(url)
            .headers(self.header_map())
            .timeout(Duration::from_secs(self.config.timeout))
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return WebhookDecision::failure(format!(
                    "Request timeout: Webhook did not respond within {} seconds",
                    self.config.timeout
                ));
            }
            Err(err) => {
                return WebhookDecision::failure(format!("Network error: {err}"));
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::OK => self.apply_sync_decision(&record.id, &body),
            StatusCode::ACCEPTED => WebhookDecision {
                success: true,
                waiting_for_callback: true,
                ..WebhookDecision::default()
            },
            s if s.is_client_error() => WebhookDecision::failure(format!(
                "Client error ({}): {}",
                s.as_u16(),
                extract_error_text(&body)
            )),
            s if s.is_server_error() => WebhookDecision::failure(format!(
                "Server error ({}): {}",
                s.as_u16(),
                extract_error_text(&body)
            )),
            s => WebhookDecision::failure(format!("Unexpected status code: {}", s.as_u16())),
        }
    }

    fn apply_sync_decision(&self, id: &str, body: &str) -> WebhookDecision {
        let Ok(Value::Object(parsed)) = serde_json::from_str::<Value>(body) else {
            return WebhookDecision::failure("Invalid response format");
        };
        let Some(approved) = parsed.get("approved").and_then(Value::as_bool) else {
            return WebhookDecision::failure("Invalid response format");
        };

        let approved_by = parsed
            .get("approvedBy")
            .and_then(Value::as_str)
            .unwrap_or("webhook")
            .to_string();
        let reason = parsed
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string);

        let applied = if approved {
            self.store.approve(id, Some(&approved_by))
        } else {
            self.store.deny(id)
        };
        if !applied {
            tracing::warn!(
                approval_id = id,
                "webhook decision arrived after the record left pending"
            );
        }

        WebhookDecision {
            success: true,
            approved: Some(approved),
            approved_by: Some(approved_by),
            reason,
            waiting_for_callback: false,
            error: None,
        }
    }

    /// Asynchronous callback path; mirrors the native handler but drives
    /// approve/deny from the callback body.
    #[must_use]
    pub fn handle_callback(&self, id: &str, response: &CallbackResponse) -> ApprovalOutcome {
        let id = id.trim();
        if id.is_empty() {
            return ApprovalOutcome {
                success: false,
                message: "Invalid approval id".to_string(),
                record: None,
            };
        }

        let Some(record) = self.store.get(id) else {
            return ApprovalOutcome {
                success: false,
                message: format!("Approval request not found: {id}"),
                record: None,
            };
        };

        match record.status {
            ApprovalStatus::Pending => {
                let who = response.approved_by.as_deref().unwrap_or("webhook");
                let applied = if response.approved {
                    self.store.approve(id, Some(who))
                } else {
                    self.store.deny(id)
                };
                if !applied {
                    return self.handle_callback(id, response);
                }
                let message = if response.approved {
                    format!("Approved by {who}: {id}")
                } else {
                    match response.reason.as_deref() {
                        Some(reason) => format!("Denied by {who}: {reason}"),
                        None => format!("Denied by {who}: {id}"),
                    }
                };
                ApprovalOutcome {
                    success: true,
                    message,
                    record: self.store.get(id),
                }
            }
            ApprovalStatus::Expired => ApprovalOutcome {
                success: false,
                message: format!("Approval request has expired: {id}"),
                record: Some(record),
            },
            ApprovalStatus::Approved => ApprovalOutcome {
                success: false,
                message: format!("Approval request already approved: {id}"),
                record: Some(record),
            },
            ApprovalStatus::Denied => ApprovalOutcome {
                success: false,
                message: format!("Approval request already denied: {id}"),
                record: Some(record),
            },
        }
    }

    fn header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.config.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => {
                    tracing::warn!(header = %name, "skipping invalid webhook header");
                }
            }
        }
        headers
    }
}

/// Pull a human-readable message out of an error body: JSON
/// `error`/`message` fields first, then the raw text.
fn extract_error_text(body: &str) -> String {
    if let Ok(Value::Object(parsed)) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message"] {
            if let Some(text) = parsed.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}
