//! Log Harness - HTTP test server for a structured logging pipeline.
//!
//! Each endpoint emits sample records through the pipeline (console, plus
//! CloudWatch Logs in production) so the output can be checked end to end.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;

mod api;
mod config;
mod context;
mod domain;
mod error;
mod logging;
mod pipeline;

use crate::api::build_router;
use crate::config::{AppEnvironment, Settings};
use crate::error::HarnessError;
use crate::pipeline::{build_sinks, Logger, SinkSet};

/// How long shutdown waits for remote sinks to flush.
const SINK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Settings loaded at startup.
    pub settings: Arc<Settings>,
    /// Application log pipeline.
    pub logger: Logger,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: No .env file loaded ({e})");
    }

    // Initialize diagnostics
    logging::init(&AppEnvironment::from_process_env());

    tracing::info!("Starting log harness v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load().map_err(|e| {
        let err = HarnessError::from(e);
        tracing::error!(error = %err, "Failed to load configuration");
        err
    })?;

    tracing::info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        log_level = %settings.log_level,
        "Configuration loaded"
    );

    // Build the log pipeline
    let sink_set = build_sinks(&settings);
    tracing::info!(sinks = ?sink_set.names(), "Log pipeline ready");
    let SinkSet { sinks, workers } = sink_set;
    let logger = Logger::new(settings.log_level, sinks);

    let settings = Arc::new(settings);
    let state = AppState {
        settings: settings.clone(),
        logger: logger.clone(),
    };

    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;

    let cloudwatch = if settings.remote_sink().is_some() {
        "ENABLED"
    } else {
        "DISABLED"
    };
    logger.info(
        "Server started",
        json!({
            "port": settings.server.port,
            "environment": settings.environment.as_str(),
            "cloudwatch": cloudwatch,
        }),
    );
    tracing::info!(address = %addr, "Server listening");
    tracing::info!("Test endpoints: GET / /test/info /test/warn /test/error /test/all /test/metadata /test/throw-error");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    logger.info("Server stopped", json!({}));

    // Dropping the last logger handle closes the remote sink channels
    drop(logger);
    for worker in workers {
        if tokio::time::timeout(SINK_DRAIN_TIMEOUT, worker).await.is_err() {
            tracing::warn!("Timed out waiting for log sink to flush");
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
