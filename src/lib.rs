//! # monitor-relay
//!
//! Ships monitoring results from a producing instance to a collecting
//! instance over plain TCP, authenticating every message with an HMAC under
//! a shared key.
//!
//! ## Architecture
//!
//! - **Sender**: accumulates one batch per cycle, then opens a fresh
//!   connection per flush and writes a single frame (at-most-once delivery)
//! - **Receiver**: one task, one connection at a time; each frame is read to
//!   EOF, authenticated, decoded, and handed to an [`Aggregator`]
//!
//! ## Example
//!
//! ```ignore
//! use monitor_relay::{ChannelAggregator, Receiver, ReceiverConfig, SharedKey};
//!
//! #[tokio::main]
//! async fn main() -> monitor_relay::Result<()> {
//!     let key = SharedKey::new("shared-secret")?;
//!     let (aggregator, mut results) = ChannelAggregator::new();
//!     let handle = Receiver::bind(ReceiverConfig::new(1234, key), aggregator)
//!         .await?
//!         .start();
//!
//!     while let Some(result) = results.recv().await {
//!         println!("{} monitors from {}", result.batch.len(), result.source);
//!     }
//!
//!     handle.request_stop();
//!     handle.join().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::{LoggingConfig, ReceiverConfig, RelayConfig, SenderConfig};
pub use error::{RelayError, Result};
pub use protocol::aggregator::{Aggregator, ChannelAggregator, DecodedResult};
pub use protocol::batch::{BatchRecord, MonitorRecord, Reportable};
pub use service::receiver::{Receiver, ReceiverHandle, ReceiverState};
pub use service::sender::{FlushOutcome, Sender, SenderState};
pub use utils::crypto::{DigestAlgorithm, SharedKey};
