//! Record formatting.
//!
//! Two styles: a single human-readable line for development consoles, and a
//! flat JSON object for production consoles and the remote sink.

use std::sync::Arc;

use chrono::{Local, SecondsFormat};
use serde_json::Value;

use crate::domain::LogRecord;

/// Keys owned by the record in JSON output. Metadata keys with these names
/// are overwritten.
pub const RESERVED_KEYS: [&str; 6] = ["level", "message", "timestamp", "traceId", "service", "stack"];

/// Output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStyle {
    /// `<timestamp> [<LEVEL>] [TraceId: <id>] : <message>< metadata>`
    Text,
    /// One JSON object per record.
    Json,
}

/// Renders records in a fixed style, stamping the service name.
#[derive(Debug, Clone)]
pub struct Formatter {
    style: FormatStyle,
    service: Arc<str>,
}

impl Formatter {
    pub fn new(style: FormatStyle, service: impl Into<String>) -> Self {
        Self {
            style,
            service: Arc::from(service.into()),
        }
    }

    /// Render a record as one line, without a trailing newline.
    pub fn format(&self, record: &LogRecord) -> String {
        match self.style {
            FormatStyle::Text => self.format_text(record),
            FormatStyle::Json => self.to_json(record).to_string(),
        }
    }

    fn format_text(&self, record: &LogRecord) -> String {
        let timestamp = record
            .timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S");

        let trace = record
            .trace_id
            .as_deref()
            .map(|id| format!("[TraceId: {}]", id))
            .unwrap_or_default();

        let body = record.stack.as_deref().unwrap_or(&record.message);

        let metadata = if record.metadata.is_empty() {
            String::new()
        } else {
            format!(" {}", Value::Object(record.metadata.clone()))
        };

        format!(
            "{} [{}] {} : {}{}",
            timestamp,
            record.level.as_str().to_uppercase(),
            trace,
            body,
            metadata
        )
    }

    /// Build the JSON object for a record.
    ///
    /// Metadata is merged at the top level as-is, except for keys in
    /// [`RESERVED_KEYS`], which always come from the record.
    pub fn to_json(&self, record: &LogRecord) -> Value {
        let mut object = record.metadata.clone();
        for key in RESERVED_KEYS {
            object.remove(key);
        }

        object.insert("level".to_string(), Value::from(record.level.as_str()));
        object.insert("message".to_string(), Value::from(record.message.as_str()));
        object.insert(
            "timestamp".to_string(),
            Value::from(
                record
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
        );
        object.insert("service".to_string(), Value::from(self.service.as_ref()));

        if let Some(id) = &record.trace_id {
            object.insert("traceId".to_string(), Value::from(id.as_str()));
        }
        if let Some(stack) = &record.stack {
            object.insert("stack".to_string(), Value::from(stack.as_str()));
        }

        Value::Object(object)
    }
}
