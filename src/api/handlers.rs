//! HTTP request handlers.
//!
//! Every trigger logs a fixed sample payload and answers with fixed JSON.

use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use utoipa::OpenApi;

use crate::api::routes::ApiDoc;
use crate::api::types::*;
use crate::error::{HarnessError, HarnessResult};
use crate::AppState;

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Environment summary.
///
/// GET /
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Environment summary", body = RootResponse)
    ),
    tag = "status"
)]
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    state.logger.info("Root endpoint accessed", Value::Null);

    Json(RootResponse {
        message: "Log harness test server".to_string(),
        environment: state.settings.environment.to_string(),
        cloudwatch_enabled: state.settings.cloudwatch.enabled,
        log_group: state.settings.cloudwatch.log_group.clone(),
        timestamp: now_iso(),
    })
}

/// Emit one info record.
///
/// GET /test/info
#[utoipa::path(
    get,
    path = "/test/info",
    responses((status = 200, description = "Info record emitted", body = LoggedResponse)),
    tag = "logs"
)]
pub async fn log_info(State(state): State<AppState>) -> Json<LoggedResponse> {
    state.logger.info(
        "Info log test",
        json!({
            "testId": "info-001",
            "message": "This is a test INFO log",
        }),
    );

    Json(LoggedResponse::new("info"))
}

/// Emit one warn record.
///
/// GET /test/warn
#[utoipa::path(
    get,
    path = "/test/warn",
    responses((status = 200, description = "Warn record emitted", body = LoggedResponse)),
    tag = "logs"
)]
pub async fn log_warn(State(state): State<AppState>) -> Json<LoggedResponse> {
    state.logger.warn(
        "Warning log test",
        json!({
            "testId": "warn-001",
            "message": "This is a test WARNING log",
        }),
    );

    Json(LoggedResponse::new("warn"))
}

/// Emit one error record carrying a simulated error field.
///
/// GET /test/error
#[utoipa::path(
    get,
    path = "/test/error",
    responses((status = 200, description = "Error record emitted", body = LoggedResponse)),
    tag = "logs"
)]
pub async fn log_error(State(state): State<AppState>) -> Json<LoggedResponse> {
    state.logger.error(
        "Error log test",
        json!({
            "testId": "error-001",
            "message": "This is a test ERROR log",
            "error": "Simulated error for testing",
        }),
    );

    Json(LoggedResponse::new("error"))
}

/// Emit one record at every level.
///
/// GET /test/all
#[utoipa::path(
    get,
    path = "/test/all",
    responses((status = 200, description = "Records emitted", body = AllLevelsResponse)),
    tag = "logs"
)]
pub async fn log_all(State(state): State<AppState>) -> Json<AllLevelsResponse> {
    let logger = &state.logger;
    logger.info("Testing all log levels", Value::Null);
    logger.debug("Debug level - detailed info", json!({"detail": "some data"}));
    logger.info("Info level - important event", json!({"userId": "test-123"}));
    logger.warn("Warn level - warning condition", json!({"warning": "potential issue"}));
    logger.error("Error level - error occurred", json!({"error": "something failed"}));

    Json(AllLevelsResponse {
        message: "All log levels tested".to_string(),
        note: "Check CloudWatch - debug may not appear in production mode".to_string(),
    })
}

/// Emit one info record with nested metadata.
///
/// GET /test/metadata
#[utoipa::path(
    get,
    path = "/test/metadata",
    responses((status = 200, description = "Record emitted", body = LoggedResponse)),
    tag = "logs"
)]
pub async fn log_metadata(State(state): State<AppState>) -> Json<LoggedResponse> {
    state.logger.info(
        "Log with rich metadata",
        json!({
            "userId": "user-456",
            "action": "test-metadata",
            "timestamp": now_iso(),
            "nested": {
                "data": "nested object",
                "array": [1, 2, 3],
            },
        }),
    );

    Json(LoggedResponse {
        logged: "metadata".to_string(),
        message: "Check CloudWatch for structured data".to_string(),
    })
}

/// Fail with a 500 so the error middleware handles it.
///
/// GET /test/throw-error
#[utoipa::path(
    get,
    path = "/test/throw-error",
    responses(
        (status = 500, description = "Error routed to the central handler", body = crate::error::ErrorResponse)
    ),
    tag = "logs"
)]
pub async fn throw_error() -> HarnessResult<()> {
    Err(HarnessError::with_status(
        StatusCode::INTERNAL_SERVER_ERROR,
        "This is a test error",
    ))
}

/// OpenAPI document.
///
/// GET /api-docs/openapi.json
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Catch-all for unmatched routes.
pub async fn not_found(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> (StatusCode, Json<NotFoundResponse>) {
    state.logger.warn(
        "Route not found",
        json!({
            "path": uri.path(),
            "method": method.as_str(),
        }),
    );

    (
        StatusCode::NOT_FOUND,
        Json(NotFoundResponse {
            error: "Route not found".to_string(),
            path: uri.path().to_string(),
        }),
    )
}
