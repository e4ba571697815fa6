//! Remote log sink backed by CloudWatch Logs.
//!
//! Records are formatted as JSON on the caller's task and pushed onto an
//! unbounded channel. A background worker batches them:
//! - flush every `flush_interval`, or once `max_batch` events or
//!   `max_batch_bytes` are queued
//! - a batch never exceeds the PutLogEvents limits: `max_batch` events and
//!   `max_batch_bytes`, counted as message bytes plus 26 per event
//! - messages longer than `max_event_bytes` are truncated
//! - stream name is `<prefix>-<YYYY-MM-DD>` (UTC date at flush time)
//! - a failed batch is retried on later flushes, then dropped after
//!   `max_attempts`
//!
//! Delivery failures are reported through `tracing` only; nothing is surfaced
//! to the code that emitted the record.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_cloudwatchlogs::config::{Credentials, Region};
use aws_sdk_cloudwatchlogs::error::DisplayErrorContext;
use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use aws_sdk_cloudwatchlogs::Client;
use chrono::{NaiveDate, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::CloudWatchSettings;
use crate::domain::LogRecord;
use crate::error::{HarnessError, HarnessResult};
use crate::pipeline::{FormatStyle, Formatter, LogSink};

/// Per-event overhead CloudWatch adds when sizing a batch.
pub const EVENT_OVERHEAD_BYTES: usize = 26;

/// A formatted record waiting to be shipped.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub message: String,
}

impl RemoteEvent {
    /// Size counted against the batch byte limit.
    pub fn size(&self) -> usize {
        self.message.len() + EVENT_OVERHEAD_BYTES
    }
}

/// Transport for batches of remote events.
#[async_trait]
pub trait LogShipper: Send + 'static {
    /// Deliver one batch to `stream`. Events are in emission order.
    async fn ship(&mut self, stream: &str, events: &[RemoteEvent]) -> HarnessResult<()>;
}

/// Batching behaviour of the remote worker.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_batch: usize,
    pub max_batch_bytes: usize,
    /// Longest message kept, in bytes.
    pub max_event_bytes: usize,
    pub flush_interval: Duration,
    pub max_attempts: u32,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_batch: 1000,
            max_batch_bytes: 1_048_576,
            max_event_bytes: 262_144 - EVENT_OVERHEAD_BYTES,
            flush_interval: Duration::from_millis(2000),
            max_attempts: 3,
        }
    }
}

/// Date-suffixed stream name.
pub fn stream_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}", prefix, date.format("%Y-%m-%d"))
}

/// Sink handle that feeds the background worker.
pub struct RemoteSink {
    formatter: Formatter,
    sender: mpsc::UnboundedSender<RemoteEvent>,
}

impl RemoteSink {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// The worker drains and exits once every `RemoteSink` handle is dropped;
    /// await the returned handle to wait for the final flush.
    pub fn spawn<S: LogShipper>(
        service: impl Into<String>,
        stream_prefix: impl Into<String>,
        shipper: S,
        options: BatchOptions,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = BatchWorker {
            shipper,
            stream_prefix: stream_prefix.into(),
            pending: VecDeque::new(),
            pending_bytes: 0,
            failures: 0,
            options,
        };
        let handle = tokio::spawn(worker.run(rx));

        let sink = Self {
            formatter: Formatter::new(FormatStyle::Json, service),
            sender: tx,
        };
        (sink, handle)
    }
}

impl LogSink for RemoteSink {
    fn name(&self) -> &'static str {
        "cloudwatch"
    }

    fn accept(&self, record: &LogRecord) {
        let event = RemoteEvent {
            timestamp_ms: record.timestamp.timestamp_millis(),
            message: self.formatter.format(record),
        };
        // Only fails once the worker is gone
        let _ = self.sender.send(event);
    }
}

struct BatchWorker<S> {
    shipper: S,
    stream_prefix: String,
    pending: VecDeque<RemoteEvent>,
    pending_bytes: usize,
    failures: u32,
    options: BatchOptions,
}

impl<S: LogShipper> BatchWorker<S> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RemoteEvent>) {
        let mut ticker = tokio::time::interval(self.options.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(event) => {
                        self.enqueue(event);
                        while self.batch_full() {
                            if !self.flush().await {
                                break;
                            }
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    while !self.pending.is_empty() {
                        if !self.flush().await {
                            break;
                        }
                    }
                }
            }
        }

        // Channel closed: one attempt per remaining batch
        while !self.pending.is_empty() {
            if !self.flush().await && !self.pending.is_empty() {
                tracing::warn!(
                    dropped = self.pending.len(),
                    "Remote log sink stopped with undelivered events"
                );
                break;
            }
        }

        tracing::debug!("Remote log sink worker stopped");
    }

    fn enqueue(&mut self, mut event: RemoteEvent) {
        let max = self.options.max_event_bytes;
        if event.message.len() > max {
            let mut end = max;
            while !event.message.is_char_boundary(end) {
                end -= 1;
            }
            tracing::warn!(
                bytes = event.message.len(),
                kept = end,
                "Truncating oversized log event"
            );
            event.message.truncate(end);
        }

        self.pending_bytes += event.size();
        self.pending.push_back(event);
    }

    fn batch_full(&self) -> bool {
        self.pending.len() >= self.options.max_batch
            || self.pending_bytes >= self.options.max_batch_bytes
    }

    /// Number of leading events, and their size, that fit in one batch.
    /// Always at least one event when anything is pending.
    fn next_batch(&self) -> (usize, usize) {
        let mut take = 0;
        let mut bytes = 0;
        for event in self.pending.iter().take(self.options.max_batch) {
            let size = event.size();
            if take > 0 && bytes + size > self.options.max_batch_bytes {
                break;
            }
            take += 1;
            bytes += size;
        }
        (take, bytes)
    }

    fn discard(&mut self, take: usize, bytes: usize) {
        self.pending.drain(..take);
        self.pending_bytes = self.pending_bytes.saturating_sub(bytes);
    }

    /// Ship the oldest batch. Returns whether it was delivered.
    async fn flush(&mut self) -> bool {
        if self.pending.is_empty() {
            return true;
        }

        let (take, bytes) = self.next_batch();
        let stream = stream_name(&self.stream_prefix, Utc::now().date_naive());
        let batch = &self.pending.make_contiguous()[..take];

        match self.shipper.ship(&stream, batch).await {
            Ok(()) => {
                self.discard(take, bytes);
                self.failures = 0;
                true
            }
            Err(e) => {
                self.failures += 1;
                if self.failures >= self.options.max_attempts {
                    tracing::warn!(
                        error = %e,
                        stream = %stream,
                        dropped = take,
                        "Dropping log batch after repeated delivery failures"
                    );
                    self.discard(take, bytes);
                    self.failures = 0;
                } else {
                    tracing::warn!(
                        error = %e,
                        stream = %stream,
                        attempt = self.failures,
                        "Log batch delivery failed, will retry"
                    );
                }
                false
            }
        }
    }
}

/// Ships batches with `PutLogEvents`, creating the log group and stream on
/// first use.
pub struct CloudWatchShipper {
    settings: CloudWatchSettings,
    log_group: String,
    client: Option<Client>,
    group_ready: bool,
    ready_streams: HashSet<String>,
}

impl CloudWatchShipper {
    pub fn new(settings: &CloudWatchSettings, log_group: impl Into<String>) -> Self {
        Self {
            settings: settings.clone(),
            log_group: log_group.into(),
            client: None,
            group_ready: false,
            ready_streams: HashSet::new(),
        }
    }

    /// Static credentials when configured, otherwise the default provider
    /// chain (env, profile, instance/task role).
    async fn connect(&self) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &self.settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(creds) = &self.settings.credentials {
            loader = loader.credentials_provider(Credentials::new(
                creds.access_key_id.clone(),
                creds.secret_access_key.clone(),
                None,
                None,
                "log-harness-static",
            ));
        }

        Client::new(&loader.load().await)
    }

    async fn ensure_stream(&mut self, client: &Client, stream: &str) -> HarnessResult<()> {
        if self.ready_streams.contains(stream) {
            return Ok(());
        }

        if !self.group_ready {
            match client
                .create_log_group()
                .log_group_name(&self.log_group)
                .send()
                .await
            {
                Ok(_) => {
                    client
                        .put_retention_policy()
                        .log_group_name(&self.log_group)
                        .retention_in_days(self.settings.retention_days)
                        .send()
                        .await
                        .map_err(remote_error)?;
                    tracing::info!(
                        log_group = %self.log_group,
                        retention_days = self.settings.retention_days,
                        "Created CloudWatch log group"
                    );
                }
                Err(e)
                    if e
                        .as_service_error()
                        .is_some_and(|se| se.is_resource_already_exists_exception()) => {}
                Err(e) => return Err(remote_error(e)),
            }
            self.group_ready = true;
        }

        match client
            .create_log_stream()
            .log_group_name(&self.log_group)
            .log_stream_name(stream)
            .send()
            .await
        {
            Ok(_) => {}
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_resource_already_exists_exception()) => {}
            Err(e) => return Err(remote_error(e)),
        }

        self.ready_streams.insert(stream.to_string());
        Ok(())
    }
}

#[async_trait]
impl LogShipper for CloudWatchShipper {
    async fn ship(&mut self, stream: &str, events: &[RemoteEvent]) -> HarnessResult<()> {
        let client = match &self.client {
            Some(client) => client.clone(),
            None => {
                let client = self.connect().await;
                self.client = Some(client.clone());
                client
            }
        };

        self.ensure_stream(&client, stream).await?;

        let mut ordered: Vec<&RemoteEvent> = events.iter().collect();
        ordered.sort_by_key(|e| e.timestamp_ms);

        let log_events = ordered
            .into_iter()
            .map(|e| {
                InputLogEvent::builder()
                    .timestamp(e.timestamp_ms)
                    .message(e.message.clone())
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(remote_error)?;

        let output = client
            .put_log_events()
            .log_group_name(&self.log_group)
            .log_stream_name(stream)
            .set_log_events(Some(log_events))
            .send()
            .await
            .map_err(remote_error)?;

        if let Some(rejected) = output.rejected_log_events_info() {
            tracing::warn!(rejected = ?rejected, stream = %stream, "CloudWatch rejected log events");
        }

        Ok(())
    }
}

fn remote_error(err: impl std::error::Error) -> HarnessError {
    HarnessError::RemoteSink(DisplayErrorContext(err).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{metadata_from, Level, Metadata};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Shipped = Arc<Mutex<Vec<(String, Vec<RemoteEvent>)>>>;

    /// Records every batch; fails the first `fail_first` calls.
    #[derive(Default)]
    struct MemoryShipper {
        shipped: Shipped,
        calls: Arc<Mutex<u32>>,
        fail_first: u32,
    }

    #[async_trait]
    impl LogShipper for MemoryShipper {
        async fn ship(&mut self, stream: &str, events: &[RemoteEvent]) -> HarnessResult<()> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if call <= self.fail_first {
                return Err(HarnessError::RemoteSink("unavailable".to_string()));
            }
            self.shipped
                .lock()
                .unwrap()
                .push((stream.to_string(), events.to_vec()));
            Ok(())
        }
    }

    fn record(message: &str) -> LogRecord {
        LogRecord::new(Level::Info, message, Metadata::new())
    }

    fn fast_options() -> BatchOptions {
        BatchOptions {
            flush_interval: Duration::from_millis(10),
            ..BatchOptions::default()
        }
    }

    #[test]
    fn test_stream_name_is_date_suffixed() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(stream_name("app", date), "app-2024-03-09");
    }

    #[tokio::test]
    async fn test_drains_on_shutdown() {
        let shipper = MemoryShipper::default();
        let shipped = shipper.shipped.clone();
        let options = BatchOptions {
            flush_interval: Duration::from_secs(3600),
            ..BatchOptions::default()
        };

        let (sink, worker) = RemoteSink::spawn("orders-api", "app", shipper, options);
        sink.accept(&record("one"));
        sink.accept(&record("two"));
        sink.accept(&record("three"));
        drop(sink);
        worker.await.unwrap();

        let shipped = shipped.lock().unwrap();
        let events: Vec<&RemoteEvent> = shipped.iter().flat_map(|(_, e)| e).collect();
        assert_eq!(events.len(), 3);

        let expected_stream = stream_name("app", Utc::now().date_naive());
        assert!(shipped.iter().all(|(stream, _)| *stream == expected_stream));

        let first: serde_json::Value = serde_json::from_str(&events[0].message).unwrap();
        assert_eq!(first["message"], "one");
        assert_eq!(first["service"], "orders-api");
    }

    #[tokio::test]
    async fn test_batches_respect_max_size() {
        let shipper = MemoryShipper::default();
        let shipped = shipper.shipped.clone();
        let options = BatchOptions {
            max_batch: 2,
            ..fast_options()
        };

        let (sink, worker) = RemoteSink::spawn("svc", "app", shipper, options);
        for i in 0..5 {
            sink.accept(&record(&format!("event-{i}")));
        }
        drop(sink);
        worker.await.unwrap();

        let shipped = shipped.lock().unwrap();
        assert!(shipped.iter().all(|(_, batch)| batch.len() <= 2));
        assert_eq!(shipped.iter().map(|(_, b)| b.len()).sum::<usize>(), 5);
    }

    #[tokio::test]
    async fn test_batches_respect_byte_limit() {
        let shipper = MemoryShipper::default();
        let shipped = shipper.shipped.clone();
        let options = BatchOptions {
            flush_interval: Duration::from_secs(3600),
            ..BatchOptions::default()
        };
        let limit = options.max_batch_bytes;

        let (sink, worker) = RemoteSink::spawn("svc", "app", shipper, options);
        let padding = "x".repeat(2048);
        for i in 0..1000 {
            sink.accept(&LogRecord::new(
                Level::Info,
                format!("event-{i}"),
                metadata_from(json!({ "padding": padding })),
            ));
        }
        drop(sink);
        worker.await.unwrap();

        let shipped = shipped.lock().unwrap();
        let sizes: Vec<usize> = shipped
            .iter()
            .map(|(_, batch)| batch.iter().map(RemoteEvent::size).sum())
            .collect();
        assert!(sizes.len() > 1, "{sizes:?}");
        assert!(sizes.iter().all(|size| *size <= limit), "{sizes:?}");
        assert_eq!(shipped.iter().map(|(_, b)| b.len()).sum::<usize>(), 1000);
    }

    #[tokio::test]
    async fn test_oversized_event_is_truncated() {
        let shipper = MemoryShipper::default();
        let shipped = shipper.shipped.clone();
        let options = BatchOptions {
            max_event_bytes: 64,
            ..fast_options()
        };

        let (sink, worker) = RemoteSink::spawn("svc", "app", shipper, options);
        sink.accept(&record(&"é".repeat(500)));
        sink.accept(&record("small"));
        drop(sink);
        worker.await.unwrap();

        let shipped = shipped.lock().unwrap();
        let events: Vec<&RemoteEvent> = shipped.iter().flat_map(|(_, e)| e).collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].message.len() <= 64);
        assert!(events[1].message.contains("small"));
    }

    #[tokio::test]
    async fn test_failed_batch_is_retried() {
        let shipper = MemoryShipper {
            fail_first: 1,
            ..MemoryShipper::default()
        };
        let shipped = shipper.shipped.clone();

        let (sink, worker) = RemoteSink::spawn("svc", "app", shipper, fast_options());
        sink.accept(&record("retry me"));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(shipped.lock().unwrap().len(), 1);
        drop(sink);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_persistent_failure_never_blocks_shutdown() {
        let shipper = MemoryShipper {
            fail_first: u32::MAX,
            ..MemoryShipper::default()
        };
        let calls = shipper.calls.clone();

        let (sink, worker) = RemoteSink::spawn("svc", "app", shipper, fast_options());
        sink.accept(&record("lost"));
        drop(sink);
        worker.await.unwrap();

        assert!(*calls.lock().unwrap() >= 1);
    }
}
