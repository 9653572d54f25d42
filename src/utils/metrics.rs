//! Observability and Metrics
//!
//! Counters for relay traffic and failures, one [`Metrics`] per endpoint.
//!
//! Uses atomic counters so the receiver task can update them while other
//! threads read snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for one sender or receiver
#[derive(Debug)]
pub struct Metrics {
    /// Records added to a batch
    pub records_accepted: AtomicU64,
    /// Records skipped because their state failed to serialize
    pub records_skipped: AtomicU64,
    /// Frames successfully handed to the network
    pub frames_sent: AtomicU64,
    /// Total bytes sent
    pub bytes_sent: AtomicU64,
    /// Batches dropped on connect/send/close failure
    pub batches_dropped: AtomicU64,
    /// Inbound connections accepted
    pub connections_accepted: AtomicU64,
    /// Accept failures while still running
    pub accept_errors: AtomicU64,
    /// Inbound connections that failed while being read
    pub read_errors: AtomicU64,
    /// Frames fully read from a peer
    pub frames_received: AtomicU64,
    /// Total bytes received
    pub bytes_received: AtomicU64,
    /// Frames shorter than their announced digest
    pub frame_errors: AtomicU64,
    /// Frames whose digest did not verify
    pub auth_failures: AtomicU64,
    /// Payloads no enabled format could decode
    pub payload_errors: AtomicU64,
    /// Payloads decoded through the legacy format
    pub legacy_decodes: AtomicU64,
    /// Aggregator rejections
    pub integration_errors: AtomicU64,
    /// Results delivered to the aggregator
    pub results_delivered: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            records_accepted: AtomicU64::new(0),
            records_skipped: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            batches_dropped: AtomicU64::new(0),
            connections_accepted: AtomicU64::new(0),
            accept_errors: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            frame_errors: AtomicU64::new(0),
            auth_failures: AtomicU64::new(0),
            payload_errors: AtomicU64::new(0),
            legacy_decodes: AtomicU64::new(0),
            integration_errors: AtomicU64::new(0),
            results_delivered: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_accepted(&self) {
        self.records_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame sent
    pub fn frame_sent(&self, byte_count: u64) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn batch_dropped(&self) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame received
    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn frame_error(&self) {
        self.frame_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn payload_error(&self) {
        self.payload_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn legacy_decode(&self) {
        self.legacy_decodes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn integration_error(&self) {
        self.integration_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn result_delivered(&self) {
        self.results_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frame_errors: self.frame_errors.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            payload_errors: self.payload_errors.load(Ordering::Relaxed),
            legacy_decodes: self.legacy_decodes.load(Ordering::Relaxed),
            integration_errors: self.integration_errors.load(Ordering::Relaxed),
            results_delivered: self.results_delivered.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            records_accepted = snapshot.records_accepted,
            records_skipped = snapshot.records_skipped,
            frames_sent = snapshot.frames_sent,
            bytes_sent = snapshot.bytes_sent,
            batches_dropped = snapshot.batches_dropped,
            connections_accepted = snapshot.connections_accepted,
            accept_errors = snapshot.accept_errors,
            read_errors = snapshot.read_errors,
            frames_received = snapshot.frames_received,
            bytes_received = snapshot.bytes_received,
            frame_errors = snapshot.frame_errors,
            auth_failures = snapshot.auth_failures,
            payload_errors = snapshot.payload_errors,
            legacy_decodes = snapshot.legacy_decodes,
            integration_errors = snapshot.integration_errors,
            results_delivered = snapshot.results_delivered,
            uptime_seconds = snapshot.uptime_seconds,
            "Relay metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_accepted: u64,
    pub records_skipped: u64,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub batches_dropped: u64,
    pub connections_accepted: u64,
    pub accept_errors: u64,
    pub read_errors: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    pub frame_errors: u64,
    pub auth_failures: u64,
    pub payload_errors: u64,
    pub legacy_decodes: u64,
    pub integration_errors: u64,
    pub results_delivered: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.frame_sent(40);
        metrics.frame_sent(60);
        metrics.auth_failure();

        let snap = metrics.snapshot();
        assert_eq!(snap.frames_sent, 2);
        assert_eq!(snap.bytes_sent, 100);
        assert_eq!(snap.auth_failures, 1);
        assert_eq!(snap.results_delivered, 0);
    }
}
