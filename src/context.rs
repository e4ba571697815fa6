//! Per-request trace context.
//!
//! The trace id is bound to the task handling a request, so any code running
//! underneath that request can read it without it being passed around.
//! Concurrent requests run in separate tasks and never see each other's id.

use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static TRACE_ID: Arc<str>;
}

/// Trace id of the request currently being handled, if any.
///
/// Returns `None` when called outside a request scope.
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(|id| id.to_string()).ok()
}

/// Run `fut` with `trace_id` bound as the current trace id.
pub async fn scope<Fut, T>(trace_id: impl Into<String>, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    let id: Arc<str> = Arc::from(trace_id.into());
    TRACE_ID.scope(id, fut).await
}

/// Generate a fresh trace id.
pub fn new_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
