//! # Utility Modules
//!
//! Supporting utilities for digests, logging, metrics, and timeouts.
//!
//! ## Components
//! - **Crypto**: shared keys and HMAC digests with constant-time verification
//! - **Logging**: `tracing-subscriber` setup driven by [`crate::config::LoggingConfig`]
//! - **Metrics**: per-endpoint atomic counters
//! - **Timeout**: bounded waits for every network operation

pub mod crypto;
pub mod logging;
pub mod metrics;
pub mod timeout;

pub use crypto::{DigestAlgorithm, SharedKey};
pub use metrics::{Metrics, MetricsSnapshot};
