//! # Frame Codec
//!
//! Wire envelope for one relayed message.
//!
//! ```text
//! [DigestLen(1)] [Digest(DigestLen)] [Payload(N)]
//! ```
//!
//! There is no payload length field: a frame is everything the peer wrote
//! before closing its connection. The digest is an HMAC of the payload under
//! the shared key, verified in constant time on decode.

use crate::error::{constants, RelayError, Result};
use crate::utils::crypto::{to_hex, DigestAlgorithm, SharedKey};
use tracing::debug;

/// Largest digest the one-byte length prefix can describe.
pub const MAX_DIGEST_LEN: usize = u8::MAX as usize;

/// Structural view of a frame. Parsing does not authenticate anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub digest: &'a [u8],
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Split raw bytes into digest and payload.
    ///
    /// Fails with [`RelayError::FrameTooShort`] when the buffer is empty or
    /// shorter than the digest length it announces.
    pub fn parse(framed: &'a [u8]) -> Result<Self> {
        let Some((&digest_len, rest)) = framed.split_first() else {
            debug!("{}", constants::ERR_EMPTY_FRAME);
            return Err(RelayError::FrameTooShort {
                expected: 1,
                actual: 0,
            });
        };

        let digest_len = digest_len as usize;
        if rest.len() < digest_len {
            return Err(RelayError::FrameTooShort {
                expected: 1 + digest_len,
                actual: framed.len(),
            });
        }

        let (digest, payload) = rest.split_at(digest_len);
        Ok(Self { digest, payload })
    }

    /// Serialize into `[len] + digest + payload`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let digest_len = u8::try_from(self.digest.len())
            .map_err(|_| RelayError::DigestTooLong(self.digest.len()))?;

        let mut out = Vec::with_capacity(1 + self.digest.len() + self.payload.len());
        out.push(digest_len);
        out.extend_from_slice(self.digest);
        out.extend_from_slice(self.payload);
        Ok(out)
    }
}

/// Frame encoder/decoder bound to a shared key and digest algorithm.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    key: SharedKey,
    algorithm: DigestAlgorithm,
}

impl FrameCodec {
    pub fn new(key: SharedKey, algorithm: DigestAlgorithm) -> Self {
        Self { key, algorithm }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Digest `payload` and wrap it in a frame.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let digest = self.algorithm.compute(&self.key, payload)?;
        if digest.len() > MAX_DIGEST_LEN {
            return Err(RelayError::DigestTooLong(digest.len()));
        }
        Frame {
            digest: &digest,
            payload,
        }
        .to_bytes()
    }

    /// Parse and authenticate a frame, returning the payload it carries.
    pub fn decode<'a>(&self, framed: &'a [u8]) -> Result<&'a [u8]> {
        let frame = Frame::parse(framed)?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(mine) = self.algorithm.compute(&self.key, frame.payload) {
                debug!(
                    local = %to_hex(&mine),
                    remote = %to_hex(frame.digest),
                    "Computed frame digest"
                );
            }
        }

        self.algorithm
            .verify(&self.key, frame.payload, frame.digest)
            .map_err(|_| {
                debug!("{}", constants::ERR_DIGEST_MISMATCH);
                RelayError::AuthenticationFailure
            })?;

        Ok(frame.payload)
    }
}

/// Encode with the default digest algorithm.
pub fn encode(payload: &[u8], key: &SharedKey) -> Result<Vec<u8>> {
    FrameCodec::new(key.clone(), DigestAlgorithm::default()).encode(payload)
}

/// Decode with the default digest algorithm.
pub fn decode(framed: &[u8], key: &SharedKey) -> Result<Vec<u8>> {
    FrameCodec::new(key.clone(), DigestAlgorithm::default())
        .decode(framed)
        .map(<[u8]>::to_vec)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn key(raw: &str) -> SharedKey {
        SharedKey::new(raw).unwrap()
    }

    #[test]
    fn test_known_vector_layout() {
        let payload = br#"{"a":1}"#;
        let framed = encode(payload, &key("testkey")).unwrap();

        assert_eq!(framed.len(), 40);
        assert_eq!(framed[0], 32);
        assert_eq!(&framed[33..], payload);

        let expected = DigestAlgorithm::Sha256
            .compute(&key("testkey"), payload)
            .unwrap();
        assert_eq!(&framed[1..33], expected.as_slice());

        assert_eq!(decode(&framed, &key("testkey")).unwrap(), payload);
    }

    #[test]
    fn test_empty_payload() {
        let framed = encode(b"", &key("k")).unwrap();
        assert_eq!(framed.len(), 33);
        assert!(decode(&framed, &key("k")).unwrap().is_empty());
    }

    #[test]
    fn test_empty_input_is_too_short() {
        assert!(matches!(
            decode(&[], &key("k")),
            Err(RelayError::FrameTooShort {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn test_truncated_digest() {
        let framed = encode(b"hello", &key("k")).unwrap();
        let result = decode(&framed[..10], &key("k"));
        assert!(matches!(
            result,
            Err(RelayError::FrameTooShort {
                expected: 33,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_wrong_key() {
        let framed = encode(b"hello", &key("one")).unwrap();
        assert!(matches!(
            decode(&framed, &key("two")),
            Err(RelayError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_algorithm_mismatch_is_auth_failure() {
        let sender = FrameCodec::new(key("k"), DigestAlgorithm::Sha512);
        let receiver = FrameCodec::new(key("k"), DigestAlgorithm::Sha256);
        let framed = sender.encode(b"data").unwrap();
        assert_eq!(framed[0], 64);
        assert!(matches!(
            receiver.decode(&framed),
            Err(RelayError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_oversized_digest_rejected() {
        let digest = [0u8; 256];
        let frame = Frame {
            digest: &digest,
            payload: b"",
        };
        assert!(matches!(frame.to_bytes(), Err(RelayError::DigestTooLong(256))));
    }

    #[test]
    fn test_parse_zero_length_digest() {
        let frame = Frame::parse(&[0, 1, 2, 3]).unwrap();
        assert!(frame.digest.is_empty());
        assert_eq!(frame.payload, &[1, 2, 3]);
        // Structurally valid, but never authentic
        assert!(decode(&[0, 1, 2, 3], &key("k")).is_err());
    }
}
