//! Logger - filters records by level and dispatches them to every sink.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::domain::{metadata_from, Level, LogRecord};
use crate::pipeline::{
    BatchOptions, CloudWatchShipper, ConsoleSink, FormatStyle, Formatter, LogSink, RemoteSink,
};

/// Application log pipeline. Cheap to clone; all clones share the sinks.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    min_level: Level,
    sinks: Vec<Box<dyn LogSink>>,
}

impl Logger {
    pub fn new(min_level: Level, sinks: Vec<Box<dyn LogSink>>) -> Self {
        Self {
            inner: Arc::new(LoggerInner { min_level, sinks }),
        }
    }

    pub fn enabled(&self, level: Level) -> bool {
        level.passes(self.inner.min_level)
    }

    /// Deliver a prepared record to every sink, unless it is below the
    /// minimum level.
    pub fn emit(&self, record: LogRecord) {
        if !self.enabled(record.level) {
            return;
        }
        for sink in &self.inner.sinks {
            sink.accept(&record);
        }
    }

    /// Log `message` with `metadata` (usually a `json!` object).
    ///
    /// A string `message` field in the metadata is appended to the record
    /// message rather than kept as metadata.
    pub fn log(&self, level: Level, message: &str, metadata: Value) {
        if !self.enabled(level) {
            return;
        }

        let mut metadata = metadata_from(metadata);
        let message = match metadata.remove("message") {
            Some(Value::String(extra)) => format!("{} {}", message, extra),
            Some(other) => {
                metadata.insert("message".to_string(), other);
                message.to_string()
            }
            None => message.to_string(),
        };
        self.emit(LogRecord::new(level, message, metadata));
    }

    pub fn debug(&self, message: &str, metadata: Value) {
        self.log(Level::Debug, message, metadata);
    }

    pub fn info(&self, message: &str, metadata: Value) {
        self.log(Level::Info, message, metadata);
    }

    pub fn warn(&self, message: &str, metadata: Value) {
        self.log(Level::Warn, message, metadata);
    }

    pub fn error(&self, message: &str, metadata: Value) {
        self.log(Level::Error, message, metadata);
    }
}

/// Sinks built from settings, plus the background workers some of them run.
pub struct SinkSet {
    pub sinks: Vec<Box<dyn LogSink>>,
    pub workers: Vec<JoinHandle<()>>,
}

impl SinkSet {
    pub fn names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

/// Console output style: text in development, JSON everywhere else.
pub fn console_style(settings: &Settings) -> FormatStyle {
    if settings.is_development() {
        FormatStyle::Text
    } else {
        FormatStyle::Json
    }
}

/// Build the sink list for `settings`.
///
/// The console sink is always present, in text style for development and JSON
/// otherwise. The CloudWatch sink is added when [`Settings::remote_sink`]
/// allows it; its worker is spawned on the current tokio runtime.
pub fn build_sinks(settings: &Settings) -> SinkSet {
    let mut sinks: Vec<Box<dyn LogSink>> = vec![Box::new(ConsoleSink::new(Formatter::new(
        console_style(settings),
        settings.service_name(),
    )))];
    let mut workers = Vec::new();

    if let Some(cw) = settings.remote_sink() {
        let log_group = settings.service_name().to_string();
        tracing::info!(
            log_group = %log_group,
            stream_prefix = %cw.log_stream_prefix,
            region = ?cw.region,
            static_credentials = cw.credentials.is_some(),
            "CloudWatch log sink enabled"
        );

        let shipper = CloudWatchShipper::new(cw, log_group.clone());
        let (sink, worker) = RemoteSink::spawn(
            log_group,
            cw.log_stream_prefix.clone(),
            shipper,
            BatchOptions::default(),
        );
        sinks.push(Box::new(sink));
        workers.push(worker);
    } else if settings.cloudwatch.enabled {
        tracing::warn!(
            environment = %settings.environment,
            log_group_set = settings.cloudwatch.log_group.is_some(),
            "CloudWatch log sink requested but not wired (needs production and a log group)"
        );
    }

    SinkSet { sinks, workers }
}
