// SPDX-License-Identifier: MIT OR Apache-2.0
//! nexus-server
#![deny(unsafe_code)]
//!
//! The A2A HTTP dispatcher: discovery, execution, cancellation, and
//! liveness endpoints over the skill registry.
//!
//! Request flow for `POST /a2a/execute`: look the skill up, authorize the
//! caller, validate the input against the skill's schema, then execute
//! under the request deadline.  Every failure becomes the standard
//! `{"success": false, "error": ...}` envelope with the status the error
//! taxonomy dictates; internal errors are logged with a correlation id and
//! never leak their message.

/// Middleware: request ids, request logging, load shedding, CORS.
pub mod middleware;

use axum::{
    Json, Router,
    extract::{Extension, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use middleware::{ConcurrencyLimiter, RequestId, RequestLogger, cors_layer, request_id_middleware};
use nexus_auth::AuthContext;
use nexus_config::NexusConfig;
use nexus_error::{ErrorCategory, NexusError};
use nexus_skills::{SERVICE_NAME, SERVICE_VERSION, SkillRegistry, validate_input};
use nexus_store::KnowledgeBase;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;
use uuid::Uuid;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    /// Immutable startup configuration.
    pub config: Arc<NexusConfig>,
    /// The skill registry, immutable after startup.
    pub registry: Arc<SkillRegistry>,
    /// Caller identity resolution and authorization.
    pub auth: Arc<AuthContext>,
    /// The knowledge base, for the liveness probe.
    pub kb: Arc<KnowledgeBase>,
}

/// Build the Axum router with all dispatcher routes.
pub fn build_app(state: Arc<AppState>) -> Router {
    let limiter = ConcurrencyLimiter::new(state.config.limits.max_in_flight);
    let cors = cors_layer(state.config.cors_origins.as_deref());

    Router::new()
        .route("/", get(cmd_root))
        .route("/health", get(cmd_health))
        .route("/.well-known/agent.json", get(cmd_agent_card))
        .route("/a2a/execute", post(cmd_execute))
        .route("/a2a/cancel", post(cmd_cancel))
        .layer(axum::middleware::from_fn(RequestLogger::layer))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(limiter.into_layer())
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn cmd_root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "endpoints": {
            "discovery": "/.well-known/agent.json",
            "execute": "/a2a/execute",
            "cancel": "/a2a/cancel",
            "health": "/health",
        },
        "skills_registered": state.registry.len(),
        "skills": state.registry.skill_ids(),
    }))
}

async fn cmd_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // A slow or broken store flips the flag but never the status code.
    let timeout = Duration::from_secs(state.config.limits.kb_io_timeout_secs);
    let accessible = matches!(
        tokio::time::timeout(timeout, state.kb.load()).await,
        Ok(Ok(_))
    );

    Json(json!({
        "status": "healthy",
        "version": SERVICE_VERSION,
        "skills_registered": state.registry.len(),
        "knowledge_base_accessible": accessible,
    }))
}

async fn cmd_agent_card(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.agent_card(&state.config.public_url()))
}

async fn cmd_execute(
    State(state): State<Arc<AppState>>,
    Extension(RequestId(correlation_id)): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(skill_id) = body.get("skill_id").and_then(Value::as_str) else {
        return failure(
            StatusCode::BAD_REQUEST,
            json!({ "error": "skill_id is required" }),
        );
    };
    let input = body.get("input").cloned().unwrap_or_else(|| json!({}));

    // 1. Lookup.
    let Some(skill) = state.registry.get(skill_id) else {
        return failure(
            StatusCode::NOT_FOUND,
            json!({
                "error": format!("unknown skill '{skill_id}'"),
                "available_skills": state.registry.skill_ids(),
            }),
        );
    };

    // 2. Authorization.
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let identity = state.auth.resolve(authorization);
    if let Err(err) = state
        .auth
        .authorize(skill_id, skill.requires_authentication(), &identity)
    {
        return error_response(err, correlation_id);
    }

    // 3. Declarative validation.
    if let Err(violations) = validate_input(&skill.input_schema(), &input) {
        return failure(
            StatusCode::BAD_REQUEST,
            json!({
                "error": format!("input validation failed: {}", violations.join("; ")),
                "violations": violations,
            }),
        );
    }

    // 4. Execute under the request deadline.
    let deadline = Duration::from_secs(state.config.limits.request_deadline_secs);
    match tokio::time::timeout(deadline, skill.execute(input, &identity)).await {
        Ok(Ok(output)) => (StatusCode::OK, Json(output)).into_response(),
        Ok(Err(err)) => error_response(err, correlation_id),
        Err(_elapsed) => failure(
            StatusCode::GATEWAY_TIMEOUT,
            json!({ "error": "request deadline exceeded", "retryable": true }),
        ),
    }
}

async fn cmd_cancel(Json(body): Json<Value>) -> Response {
    let Some(task_id) = body.get("task_id").and_then(Value::as_str) else {
        return failure(
            StatusCode::BAD_REQUEST,
            json!({ "error": "task_id is required" }),
        );
    };

    // Skills execute synchronously, so there is never a task to stop; the
    // endpoint exists to keep the protocol shape.
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "cancelled",
            "task_id": task_id,
        })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Error envelopes
// ---------------------------------------------------------------------------

/// Build a failure envelope, forcing `success: false`.
fn failure(status: StatusCode, mut body: Value) -> Response {
    if let Some(object) = body.as_object_mut() {
        object.insert("success".into(), Value::Bool(false));
    }
    (status, Json(body)).into_response()
}

/// Map a taxonomy error to its HTTP status and envelope.
fn error_response(err: NexusError, correlation_id: Uuid) -> Response {
    let status = StatusCode::from_u16(err.code.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let internal = matches!(
        err.category(),
        ErrorCategory::Internal | ErrorCategory::Config
    );
    if internal {
        error!(
            code = err.code.as_str(),
            error = %err,
            correlation_id = %correlation_id,
            "internal error while executing skill"
        );
        return failure(
            status,
            json!({
                "error": "internal error",
                "code": err.code.as_str(),
                "correlation_id": correlation_id.to_string(),
            }),
        );
    }

    let mut body = json!({ "error": err.message, "code": err.code.as_str() });
    if err.retryable() {
        body["retryable"] = json!(true);
    }
    failure(status, body)
}
