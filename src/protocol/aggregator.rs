use crate::core::serialization::PayloadFormat;
use crate::error::{constants, RelayError, Result};
use crate::protocol::batch::BatchRecord;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// A batch received from a remote instance, ready for the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedResult {
    pub batch: BatchRecord,
    pub source: SocketAddr,
    pub format: PayloadFormat,
}

/// Consumer of decoded remote results.
///
/// `ingest` runs on the receiver task and may fail; the receiver logs the
/// failure and keeps going. Implementations should return promptly since the
/// receiver handles one connection at a time.
pub trait Aggregator: Send + Sync + 'static {
    fn ingest(&self, result: DecodedResult) -> Result<()>;
}

impl<F> Aggregator for F
where
    F: Fn(DecodedResult) -> Result<()> + Send + Sync + 'static,
{
    fn ingest(&self, result: DecodedResult) -> Result<()> {
        self(result)
    }
}

/// Forwards every result into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelAggregator {
    tx: mpsc::UnboundedSender<DecodedResult>,
}

impl ChannelAggregator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DecodedResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Aggregator for ChannelAggregator {
    fn ingest(&self, result: DecodedResult) -> Result<()> {
        self.tx
            .send(result)
            .map_err(|_| RelayError::IntegrationError(constants::ERR_AGGREGATOR_CLOSED.into()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn sample() -> DecodedResult {
        DecodedResult {
            batch: BatchRecord::new(),
            source: "127.0.0.1:4000".parse().unwrap(),
            format: PayloadFormat::Primary,
        }
    }

    #[test]
    fn test_closure_aggregator() {
        let agg = |r: DecodedResult| -> Result<()> {
            assert_eq!(r.source.port(), 4000);
            Ok(())
        };
        assert!(agg.ingest(sample()).is_ok());
    }

    #[test]
    fn test_channel_aggregator_closed() {
        let (agg, rx) = ChannelAggregator::new();
        drop(rx);
        assert!(matches!(
            agg.ingest(sample()),
            Err(RelayError::IntegrationError(_))
        ));
    }

    #[test]
    fn test_channel_aggregator_delivers() {
        let (agg, mut rx) = ChannelAggregator::new();
        agg.ingest(sample()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), sample());
    }
}
