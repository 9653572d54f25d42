//! # Error Types
//!
//! Error handling for the monitor relay.
//!
//! This module defines every error variant that can occur while framing,
//! authenticating, serializing, sending, or receiving monitor results.
//!
//! ## Error Categories
//! - **Configuration Errors**: missing or empty key, bad host or port (fatal at startup)
//! - **Transport Errors**: connect/send/close failures on the sending side
//! - **Frame Errors**: truncated frames and digest mismatches on the receiving side
//! - **Payload Errors**: payloads that neither the primary nor the legacy format accept
//! - **Integration Errors**: the aggregator rejected (or panicked on) a decoded result
//!
//! Only configuration errors are meant to stop anything. Everything else is
//! isolated to a single batch or a single inbound connection.
//!
//! ## Example Usage
//! ```rust
//! use monitor_relay::error::{RelayError, Result};
//! use monitor_relay::utils::crypto::SharedKey;
//! use tracing::error;
//!
//! fn load_key(raw: &str) -> Result<SharedKey> {
//!     SharedKey::new(raw.as_bytes())
//! }
//!
//! match load_key("") {
//!     Ok(_) => unreachable!(),
//!     Err(e @ RelayError::ConfigError(_)) => error!(error = %e, "Refusing to start"),
//!     Err(e) => error!(error = %e, "Unexpected error"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Configuration errors
    pub const ERR_EMPTY_KEY: &str = "Shared key is missing or empty";
    pub const ERR_EMPTY_HOST: &str = "Sender host cannot be empty";
    pub const ERR_ZERO_PORT: &str = "Sender port must be between 1 and 65535";

    /// Frame errors
    pub const ERR_EMPTY_FRAME: &str = "Did not receive any data";
    pub const ERR_DIGEST_MISMATCH: &str =
        "Mismatched digest for network data (mismatched key or incompatible peer?)";

    /// Payload errors
    pub const ERR_LEGACY_DISABLED: &str =
        "Payload is not valid JSON and the legacy format is disabled";
    pub const ERR_ALL_FORMATS_FAILED: &str = "Payload rejected by primary and legacy formats";

    /// Integration errors
    pub const ERR_AGGREGATOR_PANICKED: &str = "Aggregator panicked while ingesting result";
    pub const ERR_AGGREGATOR_CLOSED: &str = "Aggregator channel closed";

    /// Receiver lifecycle errors
    pub const ERR_RECEIVER_TASK: &str = "Receiver task terminated abnormally";
}

// RelayError is the primary error type for all relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    #[error("Authentication failed: digest mismatch")]
    AuthenticationFailure,

    #[error("Digest too long for frame header: {0} bytes")]
    DigestTooLong(usize),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Payload format error: {0}")]
    PayloadFormat(String),

    #[error("Integration error: {0}")]
    IntegrationError(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Custom error: {0}")]
    Custom(String),
}

impl RelayError {
    /// True for errors that are confined to a single inbound message.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            RelayError::FrameTooShort { .. }
                | RelayError::AuthenticationFailure
                | RelayError::PayloadFormat(_)
                | RelayError::IntegrationError(_)
        )
    }
}

/// Type alias for Results using RelayError
pub type Result<T> = std::result::Result<T, RelayError>;
