//! Error types for the log harness.
//!
//! Handler errors do not render their own body. `IntoResponse` attaches an
//! [`ErrorReport`] to the response and the error middleware in
//! `api::middleware` logs it and decides what the client sees.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::domain::render_error_chain;

/// Message returned to clients when the real one must not leak.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Unified error type for the log harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// An error raised by a handler with an explicit status code.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Remote sink error: {0}")]
    RemoteSink(String),
}

impl HarnessError {
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        HarnessError::Http {
            status,
            message: message.into(),
        }
    }

    /// Status code sent to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            HarnessError::Http { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Diagnostic details of a failed request, carried in response extensions
/// from the handler to the error middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub message: String,
    pub stack: String,
}

impl From<&HarnessError> for ErrorReport {
    fn from(err: &HarnessError) -> Self {
        Self {
            status: err.status(),
            message: err.to_string(),
            stack: render_error_chain(err),
        }
    }
}

/// Error response body for API clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for HarnessError {
    fn into_response(self) -> Response {
        let report = ErrorReport::from(&self);
        let body = ErrorResponse {
            error: GENERIC_ERROR_MESSAGE.to_string(),
        };

        let mut response = (report.status, Json(body)).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

/// Result type alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_passthrough() {
        let err = HarnessError::with_status(StatusCode::BAD_GATEWAY, "upstream");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            HarnessError::RemoteSink("throttled".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err = HarnessError::from(config::ConfigError::Message("bad source".to_string()));
        assert!(matches!(err, HarnessError::Config(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Configuration error: bad source");
    }

    #[test]
    fn test_into_response_attaches_report() {
        let err = HarnessError::with_status(StatusCode::INTERNAL_SERVER_ERROR, "This is a test error");
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert_eq!(report.message, "This is a test error");
        assert!(report.stack.starts_with("Error: This is a test error"));
    }
}
