//! Log sinks - destinations that receive every record passing the level
//! filter.

use std::io::Write;
use std::sync::Mutex;

use crate::domain::LogRecord;
use crate::pipeline::Formatter;

/// A destination for log records.
///
/// `accept` must not block the caller on remote I/O and never fails; a sink
/// that cannot deliver a record deals with it internally.
pub trait LogSink: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Deliver one record.
    fn accept(&self, record: &LogRecord);
}

/// Writes one formatted line per record to stdout (or any writer).
pub struct ConsoleSink {
    formatter: Formatter,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    /// Console sink writing to stdout.
    pub fn new(formatter: Formatter) -> Self {
        Self::with_writer(formatter, std::io::stdout())
    }

    pub fn with_writer(formatter: Formatter, writer: impl Write + Send + 'static) -> Self {
        Self {
            formatter,
            writer: Mutex::new(Box::new(writer)),
        }
    }
}

impl LogSink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    fn accept(&self, record: &LogRecord) {
        let line = self.formatter.format(record);
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            tracing::debug!(error = %e, "Console sink write failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory sinks and writers for tests.

    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use super::LogSink;
    use crate::domain::LogRecord;

    /// Collects every record it receives.
    #[derive(Clone, Default)]
    pub struct MemorySink {
        records: Arc<Mutex<Vec<LogRecord>>>,
    }

    impl MemorySink {
        pub fn records(&self) -> Vec<LogRecord> {
            self.records.lock().unwrap().clone()
        }

        pub fn messages(&self) -> Vec<String> {
            self.records().into_iter().map(|r| r.message).collect()
        }
    }

    impl LogSink for MemorySink {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn accept(&self, record: &LogRecord) {
            self.records.lock().unwrap().push(record.clone());
        }
    }

    /// A `Write` whose bytes can be read back after being moved into a sink.
    #[derive(Clone, Default)]
    pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::SharedBuffer;
    use super::*;
    use crate::domain::{Level, Metadata};
    use crate::pipeline::FormatStyle;

    #[test]
    fn test_console_sink_writes_one_line_per_record() {
        let buffer = SharedBuffer::default();
        let sink = ConsoleSink::with_writer(
            Formatter::new(FormatStyle::Json, "svc"),
            buffer.clone(),
        );

        sink.accept(&LogRecord::new(Level::Info, "first", Metadata::new()));
        sink.accept(&LogRecord::new(Level::Warn, "second", Metadata::new()));

        let output = buffer.contents();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["message"], "second");
        assert_eq!(second["level"], "warn");
    }

    #[test]
    fn test_console_sink_text_style() {
        let buffer = SharedBuffer::default();
        let sink = ConsoleSink::with_writer(
            Formatter::new(FormatStyle::Text, "svc"),
            buffer.clone(),
        );

        sink.accept(&LogRecord::new(Level::Error, "broken", Metadata::new()));

        assert!(buffer.contents().contains("[ERROR]  : broken"));
    }
}
