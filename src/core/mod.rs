//! # Core Protocol Components
//!
//! Frame envelope and payload encoding.
//!
//! ## Components
//! - **Frame**: digest-authenticated envelope around one payload
//! - **Serialization**: batch record encoding with a gated legacy fallback
//!
//! ## Wire Format
//! ```text
//! [DigestLen(1)] [Digest(DigestLen)] [Payload(N)]
//! ```
//!
//! ## Security
//! - Digests are compared in constant time
//! - Truncated frames are rejected before any digest work
//! - The legacy payload decoder is off unless explicitly enabled

pub mod frame;
pub mod serialization;
