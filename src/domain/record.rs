//! The log record passed from the logger to every sink.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::Level;
use crate::context;

/// Caller-supplied structured fields attached to a record.
pub type Metadata = Map<String, Value>;

/// A single log emission.
///
/// Built once per call and handed to each sink by reference; records are
/// never stored by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Trace id of the request being handled when the record was created.
    pub trace_id: Option<String>,
    pub metadata: Metadata,
    /// Rendered error chain, present when the record carries an error.
    pub stack: Option<String>,
}

impl LogRecord {
    /// Create a record stamped with the current time and trace id.
    pub fn new(level: Level, message: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            trace_id: context::current_trace_id(),
            metadata,
            stack: None,
        }
    }

    /// Attach a rendered stack (see [`render_error_chain`]).
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Convert a JSON value into record metadata.
///
/// Objects are used as-is, `null` becomes empty metadata, and any other
/// value is kept under a `value` key.
pub fn metadata_from(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map,
        Value::Null => Metadata::new(),
        other => {
            let mut map = Metadata::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Render an error and its sources, one per line.
pub fn render_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    anyhow::Chain::new(error)
        .enumerate()
        .map(|(depth, cause)| match depth {
            0 => format!("Error: {}", cause),
            _ => format!("    caused by: {}", cause),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
