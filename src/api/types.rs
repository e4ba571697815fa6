//! API response types.

use serde::Serialize;
use utoipa::ToSchema;

// ==================== Root ====================

/// Environment summary.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RootResponse {
    pub message: String,
    /// Environment name (`development`, `production`, ...).
    pub environment: String,
    /// Whether the CloudWatch sink flag is set.
    pub cloudwatch_enabled: bool,
    /// Configured log group, if any.
    pub log_group: Option<String>,
    /// ISO-8601 response time.
    pub timestamp: String,
}

// ==================== Log Triggers ====================

/// Confirmation that a record was emitted.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoggedResponse {
    /// What was logged: a level name or `metadata`.
    pub logged: String,
    pub message: String,
}

impl LoggedResponse {
    pub fn new(logged: &str) -> Self {
        Self {
            logged: logged.to_string(),
            message: "Check CloudWatch for the log".to_string(),
        }
    }
}

/// Response for the all-levels trigger.
#[derive(Debug, Serialize, ToSchema)]
pub struct AllLevelsResponse {
    pub message: String,
    pub note: String,
}

// ==================== Errors ====================

/// Body of a 404 response.
#[derive(Debug, Serialize, ToSchema)]
pub struct NotFoundResponse {
    pub error: String,
    /// Path that did not match any route.
    pub path: String,
}
