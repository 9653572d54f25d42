//! Long-lived receiving end of the relay.
//!
//! The receiver binds once, then handles one inbound connection at a time:
//! read until the peer closes, authenticate, decode, hand the batch to the
//! [`Aggregator`]. Any failure along the way costs only that message.
//!
//! ## Lifecycle
//! ```text
//! Created -> Listening -> (Accepting <-> Processing) -> Stopped
//! ```
//!
//! ## Shutdown
//! [`ReceiverHandle::request_stop`] may be called from any thread. It marks
//! the stop indicator and wakes the loop out of a pending accept or read. A
//! failed accept is classified by looking at the stop indicator, never at the
//! error itself: stop requested means exit, anything else is logged and the
//! loop keeps accepting.

use crate::config::ReceiverConfig;
use crate::core::frame::FrameCodec;
use crate::core::serialization::{PayloadFormat, PayloadSerializer};
use crate::error::{constants, RelayError, Result};
use crate::protocol::aggregator::{Aggregator, DecodedResult};
use crate::transport::tcp;
use crate::utils::metrics::{Metrics, Timer};
use crate::utils::timeout::ACCEPT_ERROR_BACKOFF;

use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Receiver lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReceiverState {
    Created = 0,
    Listening = 1,
    Accepting = 2,
    Processing = 3,
    Stopped = 4,
}

impl ReceiverState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ReceiverState::Created,
            1 => ReceiverState::Listening,
            2 => ReceiverState::Accepting,
            3 => ReceiverState::Processing,
            _ => ReceiverState::Stopped,
        }
    }
}

#[derive(Debug, Default)]
struct SharedState(AtomicU8);

impl SharedState {
    fn get(&self) -> ReceiverState {
        ReceiverState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: ReceiverState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// A bound receiver that has not started yet.
pub struct Receiver {
    listener: TcpListener,
    local_addr: SocketAddr,
    codec: FrameCodec,
    serializer: PayloadSerializer,
    aggregator: Arc<dyn Aggregator>,
    read_timeout: Duration,
    state: Arc<SharedState>,
    stop: CancellationToken,
    metrics: Arc<Metrics>,
}

impl Receiver {
    /// Validate the configuration and bind the listening socket.
    #[instrument(skip(config, aggregator), fields(port = config.port))]
    pub async fn bind<A: Aggregator>(config: ReceiverConfig, aggregator: A) -> Result<Self> {
        let state = Arc::new(SharedState::default());
        state.set(ReceiverState::Created);

        config.validate_strict()?;

        let listener = tcp::bind_listener(config.socket_addr(), config.backlog)?;
        let local_addr = listener.local_addr()?;
        state.set(ReceiverState::Listening);

        info!(
            address = %local_addr,
            digest = config.digest.name(),
            allow_legacy_format = config.allow_legacy_format,
            "Listening for remote monitor results"
        );
        if config.allow_legacy_format {
            warn!("Legacy payload format is enabled; disable it once all peers send JSON");
        }

        Ok(Self {
            listener,
            local_addr,
            codec: FrameCodec::new(config.key.clone(), config.digest),
            serializer: PayloadSerializer::new(config.allow_legacy_format),
            aggregator: Arc::new(aggregator),
            read_timeout: config.read_timeout,
            state,
            stop: CancellationToken::new(),
            metrics: Arc::new(Metrics::new()),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ReceiverState {
        self.state.get()
    }

    /// Spawn the receive loop on its own task.
    pub fn start(self) -> ReceiverHandle {
        let stop = self.stop.clone();
        let state = Arc::clone(&self.state);
        let metrics = Arc::clone(&self.metrics);
        let local_addr = self.local_addr;

        let task = tokio::spawn(self.run());
        ReceiverHandle {
            stop,
            state,
            metrics,
            local_addr,
            task: Some(task),
        }
    }

    async fn run(self) {
        info!(address = %self.local_addr, "Receiver loop started");

        loop {
            if self.stop.is_cancelled() {
                break;
            }
            self.state.set(ReceiverState::Accepting);

            let accepted = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    self.state.set(ReceiverState::Processing);
                    self.metrics.connection_accepted();
                    debug!(peer = %peer, "Got connection");

                    let Some(bytes) = self.receive(stream, peer).await else {
                        continue;
                    };
                    if let Err(e) = self.process(&bytes, peer) {
                        self.log_failure(&e, peer);
                    }
                }
                Err(e) => {
                    if self.on_accept_error(&e).is_break() {
                        break;
                    }
                    tokio::select! {
                        _ = self.stop.cancelled() => break,
                        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        self.state.set(ReceiverState::Stopped);
        info!(address = %self.local_addr, "Receiver loop stopped");
        self.metrics.log_metrics();
    }

    /// Classify a failed accept by the stop indicator alone.
    ///
    /// Stop requested: the failure is the shutdown itself. Otherwise it is
    /// transient; it is logged and counted and the caller keeps accepting.
    fn on_accept_error(&self, e: &io::Error) -> ControlFlow<()> {
        if self.stop.is_cancelled() {
            debug!(error = %e, "Accept interrupted by stop request");
            return ControlFlow::Break(());
        }
        self.metrics.accept_error();
        error!(error = %e, "Socket error while accepting");
        ControlFlow::Continue(())
    }

    /// Read one frame from `stream`, closing it afterwards.
    async fn receive(&self, mut stream: TcpStream, peer: SocketAddr) -> Option<BytesMut> {
        let mut buf = BytesMut::new();

        let read = tokio::select! {
            biased;
            _ = self.stop.cancelled() => {
                debug!(peer = %peer, "Stop requested while reading; dropping connection");
                return None;
            }
            read = tcp::read_until_closed(&mut stream, &mut buf, self.read_timeout) => read,
        };
        drop(stream);

        match read {
            Ok(n) => {
                self.metrics.frame_received(n as u64);
                debug!(peer = %peer, bytes = n, "Finished receiving");
                Some(buf)
            }
            Err(e) => {
                self.metrics.read_error();
                warn!(peer = %peer, error = %e, "Failed to read from peer");
                None
            }
        }
    }

    /// Authenticate, decode, and deliver one frame.
    fn process(&self, framed: &[u8], peer: SocketAddr) -> Result<()> {
        let _timer = Timer::start("process_frame");

        let payload = self.codec.decode(framed)?;
        let (batch, format) = self.serializer.deserialize(payload)?;
        if format == PayloadFormat::LegacyUnsafe {
            self.metrics.legacy_decode();
            warn!(peer = %peer, "Accepted payload in legacy format");
        }

        let records = batch.len();
        let result = DecodedResult {
            batch,
            source: peer,
            format,
        };

        let aggregator = Arc::clone(&self.aggregator);
        match catch_unwind(AssertUnwindSafe(move || aggregator.ingest(result))) {
            Ok(Ok(())) => {
                self.metrics.result_delivered();
                debug!(peer = %peer, records, format = format.name(), "Delivered remote results");
                Ok(())
            }
            Ok(Err(RelayError::IntegrationError(msg))) => Err(RelayError::IntegrationError(msg)),
            Ok(Err(e)) => Err(RelayError::IntegrationError(e.to_string())),
            Err(_) => Err(RelayError::IntegrationError(
                constants::ERR_AGGREGATOR_PANICKED.into(),
            )),
        }
    }

    fn log_failure(&self, e: &RelayError, peer: SocketAddr) {
        match e {
            RelayError::FrameTooShort { .. } => {
                self.metrics.frame_error();
                warn!(peer = %peer, error = %e, "Did not receive enough data");
            }
            RelayError::AuthenticationFailure => {
                self.metrics.auth_failure();
                warn!(peer = %peer, "{}", constants::ERR_DIGEST_MISMATCH);
            }
            RelayError::PayloadFormat(_) => {
                self.metrics.payload_error();
                warn!(peer = %peer, error = %e, "Could not decode payload");
            }
            RelayError::IntegrationError(_) => {
                self.metrics.integration_error();
                error!(peer = %peer, error = %e, "Error adding remote monitor results");
            }
            other => {
                error!(peer = %peer, error = %other, "Receiver caught unexpected error");
            }
        }
    }
}

/// Control surface of a running receiver.
pub struct ReceiverHandle {
    stop: CancellationToken,
    state: Arc<SharedState>,
    metrics: Arc<Metrics>,
    local_addr: SocketAddr,
    task: Option<JoinHandle<()>>,
}

impl ReceiverHandle {
    /// Ask the loop to stop. Safe to call from any thread, any number of times.
    pub fn request_stop(&self) {
        if !self.stop.is_cancelled() {
            info!(address = %self.local_addr, "Receiver stop requested");
        }
        self.stop.cancel();
    }

    pub fn state(&self) -> ReceiverState {
        self.state.get()
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == ReceiverState::Stopped
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Wait for the loop to finish. Call after [`request_stop`](Self::request_stop).
    pub async fn join(mut self) -> Result<()> {
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| RelayError::Custom(format!("{}: {e}", constants::ERR_RECEIVER_TASK))),
            None => Ok(()),
        }
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        // A detached loop could never be stopped again
        self.stop.cancel();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::protocol::aggregator::ChannelAggregator;
    use crate::utils::crypto::SharedKey;

    fn config() -> ReceiverConfig {
        let mut config = ReceiverConfig::new(0, SharedKey::new("secret").unwrap());
        config.bind_address = "127.0.0.1".parse().unwrap();
        config
    }

    #[test]
    fn test_state_roundtrip() {
        for state in [
            ReceiverState::Created,
            ReceiverState::Listening,
            ReceiverState::Accepting,
            ReceiverState::Processing,
            ReceiverState::Stopped,
        ] {
            assert_eq!(ReceiverState::from_u8(state as u8), state);
        }
    }

    #[tokio::test]
    async fn test_bind_enters_listening() {
        let (agg, _rx) = ChannelAggregator::new();
        let receiver = Receiver::bind(config(), agg).await.unwrap();
        assert_eq!(receiver.state(), ReceiverState::Listening);
        assert_ne!(receiver.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_transient_accept_error_keeps_accepting() {
        let (agg, _rx) = ChannelAggregator::new();
        let receiver = Receiver::bind(config(), agg).await.unwrap();
        let err = io::Error::new(io::ErrorKind::ConnectionAborted, "peer reset before accept");

        assert_eq!(receiver.on_accept_error(&err), ControlFlow::Continue(()));
        assert_eq!(receiver.on_accept_error(&err), ControlFlow::Continue(()));
        assert_eq!(receiver.metrics.snapshot().accept_errors, 2);
    }

    #[tokio::test]
    async fn test_accept_error_after_stop_ends_loop() {
        let (agg, _rx) = ChannelAggregator::new();
        let receiver = Receiver::bind(config(), agg).await.unwrap();
        receiver.stop.cancel();
        let err = io::Error::new(io::ErrorKind::Interrupted, "interrupted");

        assert_eq!(receiver.on_accept_error(&err), ControlFlow::Break(()));
        assert_eq!(receiver.metrics.snapshot().accept_errors, 0);
    }

    #[tokio::test]
    async fn test_stop_before_any_connection() {
        let (agg, _rx) = ChannelAggregator::new();
        let handle = Receiver::bind(config(), agg).await.unwrap().start();
        handle.request_stop();
        handle.request_stop();

        let state = Arc::clone(&handle.state);
        tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("receiver did not stop in time")
            .unwrap();
        assert_eq!(state.get(), ReceiverState::Stopped);
    }
}
