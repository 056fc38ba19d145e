//! Route definitions and handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use clawsec_engine::PendingApprovalInfo;
use clawsec_types::AnalysisResult;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let concurrency = state.config.max_concurrency;
    Router::new()
        .route("/analyze", post(analyze))
        .route("/approve/:id", post(approve))
        .route("/deny/:id", post(deny))
        .route("/status", get(status))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(GlobalConcurrencyLimitLayer::new(concurrency))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Malformed `/analyze` payload; never reaches the analyzer.
struct ValidationError(String);

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.0 }))).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending_approval: Option<PendingApprovalInfo>,
    analysis: AnalysisResult,
}

fn validate_analyze_body(body: &Value) -> Result<(String, Map<String, Value>), ValidationError> {
    let Some(object) = body.as_object() else {
        return Err(ValidationError("request body must be a JSON object".into()));
    };

    let tool_name = match object.get("toolName") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        Some(Value::String(_)) => {
            return Err(ValidationError("toolName must be a non-empty string".into()));
        }
        Some(_) => return Err(ValidationError("toolName must be a string".into())),
        None => return Err(ValidationError("toolName is required".into())),
    };

    let tool_input = match object.get("toolInput") {
        Some(Value::Object(input)) => input.clone(),
        Some(_) => return Err(ValidationError("toolInput must be an object".into())),
        None => return Err(ValidationError("toolInput is required".into())),
    };

    Ok((tool_name, tool_input))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<AnalyzeResponse>, ValidationError> {
    let (tool_name, tool_input) = validate_analyze_body(&body)?;

    let session_id = body.get("sessionId").and_then(Value::as_str);
    tracing::debug!(tool = %tool_name, session_id, "analyzing tool call");

    let evaluation = state.engine.evaluate(&tool_name, tool_input).await;
    state.count_request(evaluation.allowed);

    Ok(Json(AnalyzeResponse {
        allowed: evaluation.allowed,
        message: evaluation.message,
        pending_approval: evaluation.pending_approval,
        analysis: evaluation.analysis,
    }))
}

#[derive(Serialize)]
struct DecisionResponse {
    success: bool,
    message: String,
}

async fn approve(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let outcome = state.engine.approve(&id, None);
    decision_response(outcome.success, outcome.message)
}

async fn deny(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let outcome = state.engine.deny(&id);
    decision_response(outcome.success, outcome.message)
}

fn decision_response(success: bool, message: String) -> Response {
    let status = if success {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    (status, Json(DecisionResponse { success, message })).into_response()
}

async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "active": true,
        "config": {
            "port": state.config.port,
            "host": state.config.host,
            "enabled": state.engine.config().global.enabled,
        },
        "pendingApprovals": state.engine.pending_approvals(),
        "requestsServed": state.requests_served(),
        "requestsBlocked": state.requests_blocked(),
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found" })),
    )
        .into_response()
}
