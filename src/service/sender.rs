use crate::config::SenderConfig;
use crate::core::frame::FrameCodec;
use crate::core::serialization::PayloadSerializer;
use crate::error::Result;
use crate::protocol::batch::{BatchRecord, MonitorRecord, Reportable};
use crate::transport::tcp;
use crate::utils::metrics::{Metrics, Timer};

use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Where a [`Sender`] is in its batch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    Accumulating,
    Flushing,
}

/// What happened to a flushed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The frame was written and the connection closed cleanly
    Sent { records: usize, bytes: usize },
    /// Serialization or transport failed; the batch is gone
    Dropped { records: usize },
}

/// Batches monitor results and ships each batch over a fresh TCP connection.
///
/// Delivery is at-most-once: a batch that fails to send is logged and
/// discarded, never retried or queued.
pub struct Sender {
    config: SenderConfig,
    codec: FrameCodec,
    serializer: PayloadSerializer,
    batch: BatchRecord,
    state: SenderState,
    metrics: Arc<Metrics>,
}

impl Sender {
    /// Build a sender; an invalid configuration is fatal.
    pub fn new(config: SenderConfig) -> Result<Self> {
        config.validate_strict()?;

        Ok(Self {
            codec: FrameCodec::new(config.key.clone(), config.digest),
            serializer: PayloadSerializer::default(),
            batch: BatchRecord::new(),
            state: SenderState::Idle,
            metrics: Arc::new(Metrics::new()),
            config,
        })
    }

    pub fn describe(&self) -> String {
        format!(
            "Sending monitor results to {}:{}",
            self.config.host, self.config.port
        )
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Records gathered so far in the current cycle.
    pub fn pending(&self) -> &BatchRecord {
        &self.batch
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Begin a new accumulation cycle from an empty batch.
    pub fn start_batch(&mut self) {
        if !self.batch.is_empty() {
            debug!(
                discarded = self.batch.len(),
                "Batch restarted before flush; discarding gathered records"
            );
            self.batch = BatchRecord::new();
        }
        self.state = SenderState::Accumulating;
    }

    /// Add (or replace) a monitor's result in the current batch.
    ///
    /// Ignored with an error log outside of an accumulation cycle. A monitor
    /// whose state cannot be captured is logged and skipped.
    pub fn record_result<R: Reportable + ?Sized>(&mut self, name: &str, monitor: &R) {
        if self.state != SenderState::Accumulating {
            error!(monitor = %name, state = ?self.state, "record_result called outside a batch");
            return;
        }

        match monitor.to_record() {
            Ok(record) => self.insert(name, record),
            Err(e) => {
                self.metrics.record_skipped();
                error!(monitor = %name, error = %e, "Failed to serialize monitor");
            }
        }
    }

    /// Add an already-captured record to the current batch.
    pub fn record(&mut self, name: &str, record: MonitorRecord) {
        if self.state != SenderState::Accumulating {
            error!(monitor = %name, state = ?self.state, "record called outside a batch");
            return;
        }
        self.insert(name, record);
    }

    fn insert(&mut self, name: &str, record: MonitorRecord) {
        debug!(monitor = %name, cls = %record.type_name, "Recording result");
        self.batch.insert(name, record);
        self.metrics.record_accepted();
    }

    /// Serialize, frame, and send the current batch, then reset to `Idle`.
    ///
    /// Never fails from the caller's point of view: problems are logged and the
    /// batch is dropped. The accumulator is empty afterwards on every path,
    /// including when the returned future is dropped before it completes.
    #[instrument(skip(self), fields(host = %self.config.host, port = self.config.port))]
    pub async fn flush(&mut self) -> FlushOutcome {
        let batch = self.batch.take();
        let records = batch.len();
        let _flushing = FlushingGuard::enter(&mut self.state);
        let _timer = Timer::start("flush");

        match transmit(&self.config, &self.codec, &self.serializer, &batch).await {
            Ok(bytes) => {
                self.metrics.frame_sent(bytes as u64);
                debug!(records, bytes, "Batch sent");
                FlushOutcome::Sent { records, bytes }
            }
            Err(e) => {
                self.metrics.batch_dropped();
                error!(records, error = %e, "Failed to send network data");
                FlushOutcome::Dropped { records }
            }
        }
    }
}

/// Holds the sender in `Flushing` and puts it back to `Idle` when dropped.
struct FlushingGuard<'a>(&'a mut SenderState);

impl<'a> FlushingGuard<'a> {
    fn enter(state: &'a mut SenderState) -> Self {
        *state = SenderState::Flushing;
        Self(state)
    }
}

impl Drop for FlushingGuard<'_> {
    fn drop(&mut self) {
        *self.0 = SenderState::Idle;
    }
}

async fn transmit(
    config: &SenderConfig,
    codec: &FrameCodec,
    serializer: &PayloadSerializer,
    batch: &BatchRecord,
) -> Result<usize> {
    let payload = serializer.serialize(batch)?;
    let frame = codec.encode(&payload)?;
    tcp::send_once(
        &config.host,
        config.port,
        &frame,
        config.connect_timeout,
        config.send_timeout,
    )
    .await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::error::RelayError;
    use crate::utils::crypto::SharedKey;
    use serde_json::{json, Value};

    struct Flaky;

    impl Reportable for Flaky {
        fn type_name(&self) -> &str {
            "MonitorFlaky"
        }

        fn state(&self) -> std::result::Result<Value, serde_json::Error> {
            Err(serde::ser::Error::custom("state unavailable"))
        }
    }

    fn sender() -> Sender {
        let key = SharedKey::new("secret").unwrap();
        Sender::new(SenderConfig::new("127.0.0.1", 9, key)).unwrap()
    }

    #[test]
    fn test_empty_host_is_fatal() {
        let key = SharedKey::new("secret").unwrap();
        let result = Sender::new(SenderConfig::new("", 1234, key));
        assert!(matches!(result, Err(RelayError::ConfigError(_))));
    }

    #[test]
    fn test_describe() {
        assert_eq!(sender().describe(), "Sending monitor results to 127.0.0.1:9");
    }

    #[test]
    fn test_record_outside_batch_ignored() {
        let mut sender = sender();
        sender.record("disk", MonitorRecord::new("MonitorDisk", json!(1)));
        assert!(sender.pending().is_empty());
        assert_eq!(sender.state(), SenderState::Idle);
    }

    #[test]
    fn test_start_batch_begins_empty() {
        let mut sender = sender();
        sender.start_batch();
        sender.record("old", MonitorRecord::new("MonitorOld", json!(1)));
        sender.start_batch();
        assert!(sender.pending().is_empty());
        assert_eq!(sender.state(), SenderState::Accumulating);
    }

    #[test]
    fn test_record_overwrites_same_name() {
        let mut sender = sender();
        sender.start_batch();
        sender.record("disk", MonitorRecord::new("MonitorDisk", json!(1)));
        sender.record("disk", MonitorRecord::new("MonitorDisk", json!(2)));
        assert_eq!(sender.pending().len(), 1);
        assert_eq!(sender.pending().get("disk").unwrap().state, json!(2));
    }

    #[tokio::test]
    async fn test_cancelled_flush_returns_to_idle() {
        // Held open so the connect target exists; never accepted
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let key = SharedKey::new("secret").unwrap();
        let mut sender = Sender::new(SenderConfig::new("localhost", port, key)).unwrap();

        sender.start_batch();
        sender.record("disk", MonitorRecord::new("MonitorDisk", json!(1)));
        let _ = tokio::time::timeout(std::time::Duration::ZERO, sender.flush()).await;

        assert_eq!(sender.state(), SenderState::Idle);
        assert!(sender.pending().is_empty());

        sender.start_batch();
        sender.record("disk", MonitorRecord::new("MonitorDisk", json!(2)));
        assert_eq!(sender.pending().len(), 1);
    }

    #[test]
    fn test_unserializable_monitor_skipped() {
        let mut sender = sender();
        sender.start_batch();
        sender.record_result("flaky", &Flaky);
        sender.record("ok", MonitorRecord::new("MonitorOk", json!(true)));

        assert_eq!(sender.pending().len(), 1);
        assert!(sender.pending().get("ok").is_some());
        assert_eq!(sender.metrics().snapshot().records_skipped, 1);
    }
}
