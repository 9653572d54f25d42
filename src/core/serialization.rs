//! # Payload Formats
//!
//! Turns a [`BatchRecord`] into frame payload bytes and back.
//!
//! ## Formats
//! - **Primary (JSON)**: what every current sender emits. Self-describing text,
//!   one object keyed by monitor name.
//! - **LegacyUnsafe (MessagePack)**: the binary object encoding older peers
//!   produced. Only consulted when the primary parse fails at the format level
//!   *and* the receiver was configured with `allow_legacy_format = true`.
//!
//! The legacy decoder is gated because it widens the parse surface exposed to
//! anyone holding the shared key. It is off by default; turn it on only while
//! legacy peers are still being migrated.
//!
//! ## Fallback rule
//! Fallback happens only for JSON syntax/EOF errors. A payload that is valid
//! JSON but has the wrong shape is rejected outright.

use crate::error::{constants, RelayError, Result};
use crate::protocol::batch::BatchRecord;
use serde_json::error::Category;
use tracing::debug;

/// Payload encodings a receiver may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadFormat {
    /// JSON (default)
    #[default]
    Primary,
    /// MessagePack, accepted only behind `allow_legacy_format`
    LegacyUnsafe,
}

impl PayloadFormat {
    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            PayloadFormat::Primary => "JSON",
            PayloadFormat::LegacyUnsafe => "MessagePack (legacy)",
        }
    }
}

/// Batch serializer with an explicit legacy-format capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadSerializer {
    allow_legacy: bool,
}

impl PayloadSerializer {
    pub fn new(allow_legacy: bool) -> Self {
        Self { allow_legacy }
    }

    pub fn allows_legacy(&self) -> bool {
        self.allow_legacy
    }

    /// Encode a batch in the primary format.
    ///
    /// Record state is already a JSON value by the time it reaches a batch, so
    /// per-monitor capture failures are dealt with when recording.
    pub fn serialize(&self, batch: &BatchRecord) -> Result<Vec<u8>> {
        serde_json::to_vec(batch).map_err(|e| RelayError::SerializeError(e.to_string()))
    }

    /// Encode a batch in an explicit format.
    pub fn serialize_format(&self, batch: &BatchRecord, format: PayloadFormat) -> Result<Vec<u8>> {
        match format {
            PayloadFormat::Primary => self.serialize(batch),
            PayloadFormat::LegacyUnsafe => rmp_serde::to_vec_named(batch)
                .map_err(|e| RelayError::SerializeError(e.to_string())),
        }
    }

    /// Decode a payload, trying JSON first and the legacy format second.
    pub fn deserialize(&self, data: &[u8]) -> Result<(BatchRecord, PayloadFormat)> {
        let primary_err = match serde_json::from_slice::<BatchRecord>(data) {
            Ok(batch) => return Ok((batch, PayloadFormat::Primary)),
            Err(e) => e,
        };

        if !matches!(primary_err.classify(), Category::Syntax | Category::Eof) {
            return Err(RelayError::PayloadFormat(format!(
                "Malformed batch: {primary_err}"
            )));
        }

        if !self.allow_legacy {
            debug!(error = %primary_err, "Primary parse failed; legacy format disabled");
            return Err(RelayError::PayloadFormat(format!(
                "{}: {primary_err}",
                constants::ERR_LEGACY_DISABLED
            )));
        }

        match rmp_serde::from_slice::<BatchRecord>(data) {
            Ok(batch) => {
                debug!(records = batch.len(), "Decoded payload with legacy format");
                Ok((batch, PayloadFormat::LegacyUnsafe))
            }
            Err(legacy_err) => Err(RelayError::PayloadFormat(format!(
                "{} (json: {primary_err}; legacy: {legacy_err})",
                constants::ERR_ALL_FORMATS_FAILED
            ))),
        }
    }
}
