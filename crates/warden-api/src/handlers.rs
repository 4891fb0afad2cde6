//! REST API handlers.
//!
//! Each handler calls one operation on the monitor, the restart
//! coordinator or the driver and wraps the result in a JSON envelope.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::info;

use warden_control::RestartOutcome;
use warden_core::{DriverError, ServerQueryResult};

use crate::ApiState;

const DEFAULT_LOG_LINES: usize = 50;
const MAX_LOG_LINES: usize = 1000;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn driver_error_response(e: &DriverError) -> axum::response::Response {
    let status = match e {
        DriverError::NotFound(_) => StatusCode::NOT_FOUND,
        DriverError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&e.to_string(), status).into_response()
}

// ── Health ─────────────────────────────────────────────────────

/// GET /api/v1/health
pub async fn current_health(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.monitor.evaluate().await)
}

/// GET /api/v1/health/last
pub async fn last_health(State(state): State<ApiState>) -> impl IntoResponse {
    match state.monitor.last_snapshot() {
        Some(snapshot) => ApiResponse::ok(snapshot).into_response(),
        None => error_response("no health check has completed yet", StatusCode::NOT_FOUND)
            .into_response(),
    }
}

// ── Restart ────────────────────────────────────────────────────

/// Restart request body.
#[derive(serde::Deserialize)]
pub struct RestartRequest {
    pub actor: String,
}

/// POST /api/v1/restart
pub async fn restart(
    State(state): State<ApiState>,
    Json(req): Json<RestartRequest>,
) -> impl IntoResponse {
    let actor = req.actor.trim();
    if actor.is_empty() {
        return error_response("actor is required", StatusCode::BAD_REQUEST).into_response();
    }

    info!(%actor, "restart requested");
    match state.restarts.request(actor).await {
        RestartOutcome::RateLimited { limit } => error_response(
            &format!("restart limit reached ({limit} per hour), try again later"),
            StatusCode::TOO_MANY_REQUESTS,
        )
        .into_response(),
        RestartOutcome::Failed { reason } => {
            error_response(&format!("restart failed: {reason}"), StatusCode::BAD_GATEWAY)
                .into_response()
        }
        outcome @ RestartOutcome::Restarted { .. } => ApiResponse::ok(outcome).into_response(),
    }
}

/// GET /api/v1/restart/quota/:actor
pub async fn restart_quota(
    State(state): State<ApiState>,
    Path(actor): Path<String>,
) -> impl IntoResponse {
    let governor = state.restarts.governor();
    let remaining = governor.remaining(&actor, Instant::now());
    ApiResponse::ok(serde_json::json!({
        "actor": actor,
        "remaining": remaining,
        "limit": governor.limit(),
    }))
}

// ── Container ──────────────────────────────────────────────────

/// GET /api/v1/container
pub async fn container_status(State(state): State<ApiState>) -> impl IntoResponse {
    let status = state.driver.status().await;
    ApiResponse::ok(serde_json::json!({ "status": status }))
}

/// POST /api/v1/container/start
pub async fn start_container(State(state): State<ApiState>) -> impl IntoResponse {
    match state.driver.start().await {
        Ok(()) => ApiResponse::ok("started").into_response(),
        Err(e) => driver_error_response(&e),
    }
}

/// POST /api/v1/container/stop
pub async fn stop_container(State(state): State<ApiState>) -> impl IntoResponse {
    match state.driver.stop().await {
        Ok(()) => ApiResponse::ok("stopped").into_response(),
        Err(e) => driver_error_response(&e),
    }
}

/// Logs query parameters.
#[derive(serde::Deserialize)]
pub struct LogsQuery {
    pub lines: Option<usize>,
}

/// GET /api/v1/container/logs
pub async fn container_logs(
    State(state): State<ApiState>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    let lines = query.lines.unwrap_or(DEFAULT_LOG_LINES).clamp(1, MAX_LOG_LINES);
    match state.driver.logs(lines).await {
        Ok(logs) => ApiResponse::ok(serde_json::json!({ "lines": lines, "logs": logs }))
            .into_response(),
        Err(e) => driver_error_response(&e),
    }
}

/// GET /api/v1/container/inspect
pub async fn inspect_container(State(state): State<ApiState>) -> impl IntoResponse {
    match state.driver.inspect().await {
        Ok(info) => ApiResponse::ok(info).into_response(),
        Err(e) => driver_error_response(&e),
    }
}

/// GET /api/v1/container/diagnose
pub async fn diagnose_container(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(warden_control::diagnose(state.driver.as_ref()).await)
}

/// GET /api/v1/containers
pub async fn list_containers(State(state): State<ApiState>) -> impl IntoResponse {
    match state.driver.list().await {
        Ok(containers) => ApiResponse::ok(containers).into_response(),
        Err(e) => driver_error_response(&e),
    }
}

// ── Server ─────────────────────────────────────────────────────

fn server_query_response(result: ServerQueryResult) -> axum::response::Response {
    if result.success {
        return ApiResponse::ok(result.data.unwrap_or_default()).into_response();
    }
    let error = result.error.unwrap_or_else(|| "query failed".to_string());
    let status = if error.ends_with("not configured") {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::BAD_GATEWAY
    };
    error_response(&error, status).into_response()
}

/// GET /api/v1/server/players
pub async fn server_players(State(state): State<ApiState>) -> impl IntoResponse {
    server_query_response(state.server.players().await)
}

/// GET /api/v1/server/info
pub async fn server_info(State(state): State<ApiState>) -> impl IntoResponse {
    server_query_response(state.server.info().await)
}

/// GET /api/v1/server/uptime
pub async fn server_uptime(State(state): State<ApiState>) -> impl IntoResponse {
    let uptime = state.server.uptime().await;
    match uptime.error {
        Some(error) => error_response(&error, StatusCode::BAD_GATEWAY).into_response(),
        None => ApiResponse::ok(uptime).into_response(),
    }
}
