//! Diagnostics tracing setup.
//!
//! The service's own diagnostics (startup, HTTP spans, remote sink failures)
//! go through `tracing` to stderr. Application records go through
//! [`crate::pipeline::Logger`] instead, so stdout carries only records.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AppEnvironment;

const DEFAULT_FILTER: &str = "log_harness=info,tower_http=info";

/// Initialize the tracing subscriber.
///
/// Reads the filter from RUST_LOG, defaulting to
/// `log_harness=info,tower_http=info`. Development gets human-readable output,
/// every other environment gets JSON.
pub fn init(environment: &AppEnvironment) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(filter);

    if *environment == AppEnvironment::Development {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

/// Initialize tracing for tests (human-readable format, no JSON).
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("log_harness=debug")
        .try_init();
}
