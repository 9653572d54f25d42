//! Keyed digests for frame authentication.
//!
//! Both endpoints hold the same [`SharedKey`] and agree on a
//! [`DigestAlgorithm`]. The sender computes an HMAC over the payload; the
//! receiver recomputes it and compares in constant time via
//! [`hmac::Mac::verify_slice`].

use crate::error::{constants, RelayError, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use std::fmt;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Symmetric secret shared by sender and receiver.
///
/// Never empty. The bytes are wiped when the key is dropped and never
/// appear in `Debug` output. Keys can be read from configuration but are
/// never serialized.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct SharedKey(Vec<u8>);

impl SharedKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(RelayError::ConfigError(constants::ERR_EMPTY_KEY.into()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<String> for SharedKey {
    type Error = RelayError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value.into_bytes())
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKey")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

impl Drop for SharedKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Keyed digest function used to authenticate frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// HMAC-SHA256, 32-byte digest
    #[default]
    Sha256,
    /// HMAC-SHA512, 64-byte digest
    Sha512,
}

impl DigestAlgorithm {
    /// Length in bytes of the digest this algorithm produces.
    pub fn digest_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "HMAC-SHA256",
            DigestAlgorithm::Sha512 => "HMAC-SHA512",
        }
    }

    /// Compute the keyed digest of `payload`.
    pub fn compute(self, key: &SharedKey, payload: &[u8]) -> Result<Vec<u8>> {
        let digest = match self {
            DigestAlgorithm::Sha256 => {
                let mut mac = new_mac::<HmacSha256>(key)?;
                mac.update(payload);
                mac.finalize().into_bytes().to_vec()
            }
            DigestAlgorithm::Sha512 => {
                let mut mac = new_mac::<HmacSha512>(key)?;
                mac.update(payload);
                mac.finalize().into_bytes().to_vec()
            }
        };
        Ok(digest)
    }

    /// Check `claimed` against the digest of `payload` in constant time.
    ///
    /// A claimed digest of the wrong length is a mismatch.
    pub fn verify(self, key: &SharedKey, payload: &[u8], claimed: &[u8]) -> Result<()> {
        let verified = match self {
            DigestAlgorithm::Sha256 => {
                let mut mac = new_mac::<HmacSha256>(key)?;
                mac.update(payload);
                mac.verify_slice(claimed)
            }
            DigestAlgorithm::Sha512 => {
                let mut mac = new_mac::<HmacSha512>(key)?;
                mac.update(payload);
                mac.verify_slice(claimed)
            }
        };
        verified.map_err(|_| RelayError::AuthenticationFailure)
    }
}

fn new_mac<M: Mac + hmac::digest::KeyInit>(key: &SharedKey) -> Result<M> {
    <M as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| RelayError::ConfigError(format!("Unusable shared key: {e}")))
}

/// Lowercase hex rendering for debug logs.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
