//! Route definitions for the API.

use axum::{
    handler::Handler,
    middleware,
    routing::{get, MethodRouter},
    Router,
};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api::handlers;
use crate::api::middleware::{log_requests, report_errors, trace_context};
use crate::AppState;

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root,
        handlers::log_info,
        handlers::log_warn,
        handlers::log_error,
        handlers::log_all,
        handlers::log_metadata,
        handlers::throw_error,
    ),
    components(schemas(
        crate::api::types::RootResponse,
        crate::api::types::LoggedResponse,
        crate::api::types::AllLevelsResponse,
        crate::api::types::NotFoundResponse,
        crate::error::ErrorResponse,
    )),
    tags(
        (name = "status", description = "Service status"),
        (name = "logs", description = "Log pipeline triggers")
    ),
    info(
        title = "Log Harness API",
        version = "0.1.0",
        description = "Endpoints that exercise the structured logging pipeline",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// GET route that answers other methods with the 404 fallback.
fn get_only<H, T>(handler: H) -> MethodRouter<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    get(handler).fallback(handlers::not_found)
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // Listed outermost first
    let layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_context))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(middleware::from_fn_with_state(state.clone(), report_errors));

    Router::new()
        .route("/", get_only(handlers::root))
        // Log triggers
        .route("/test/info", get_only(handlers::log_info))
        .route("/test/warn", get_only(handlers::log_warn))
        .route("/test/error", get_only(handlers::log_error))
        .route("/test/all", get_only(handlers::log_all))
        .route("/test/metadata", get_only(handlers::log_metadata))
        .route("/test/throw-error", get_only(handlers::throw_error))
        // OpenAPI docs
        .route("/api-docs/openapi.json", get_only(handlers::openapi))
        .fallback(handlers::not_found)
        .layer(layers)
        .with_state(state)
}
