//! Request middleware.
//!
//! Order, outermost first: request id, trace context, request completion
//! log, error reporting.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tower_http::request_id::RequestId;

use crate::context;
use crate::domain::{metadata_from, Level, LogRecord};
use crate::error::{ErrorReport, ErrorResponse, GENERIC_ERROR_MESSAGE};
use crate::AppState;

/// Header carrying the trace id in both directions.
pub const TRACE_ID_HEADER: &str = "x-request-id";

/// Bind the request's trace id for everything running underneath it.
///
/// Uses the id assigned by `SetRequestIdLayer` (inbound header or a fresh
/// UUID), generating one here only if that layer is absent.
pub async fn trace_context(request: Request<Body>, next: Next) -> Response {
    let trace_id = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .or_else(|| {
            request
                .headers()
                .get(TRACE_ID_HEADER)
                .and_then(|v| v.to_str().ok())
        })
        .map(String::from)
        .unwrap_or_else(context::new_trace_id);

    context::scope(trace_id, next.run(request)).await
}

/// Log a completion record for every request.
pub async fn log_requests(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    state.logger.info(
        "Request completed",
        json!({
            "method": method.as_str(),
            "path": path,
            "statusCode": response.status().as_u16(),
            "duration": format!("{}ms", started.elapsed().as_millis()),
        }),
    );

    response
}

/// Central error handler.
///
/// Picks up the [`ErrorReport`] a failed handler attached to its response,
/// logs it with the request path and method, and renders the client body.
/// The real message is only shown in development.
pub async fn report_errors(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };

    let record = LogRecord::new(
        Level::Error,
        "Server error occurred",
        metadata_from(json!({
            "error": report.message,
            "path": path,
            "method": method.as_str(),
        })),
    )
    .with_stack(report.stack);
    state.logger.emit(record);

    let message = if state.settings.is_development() {
        report.message
    } else {
        GENERIC_ERROR_MESSAGE.to_string()
    };

    (report.status, Json(ErrorResponse { error: message })).into_response()
}
