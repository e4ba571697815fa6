//! HTTP API layer for the log harness.
//!
//! Provides the log trigger endpoints, the 404 fallback and the central
//! error handler.

pub mod handlers;
mod middleware;
mod routes;
mod types;

pub use routes::build_router;
