#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for the frame codec and payload decoding
//! Boundary conditions, known vectors, and error classification

use monitor_relay::core::frame::{decode, encode, Frame, FrameCodec};
use monitor_relay::core::serialization::{PayloadFormat, PayloadSerializer};
use monitor_relay::error::RelayError;
use monitor_relay::protocol::batch::{BatchRecord, MonitorRecord};
use monitor_relay::utils::crypto::{to_hex, DigestAlgorithm, SharedKey};
use serde_json::json;

fn key(raw: &str) -> SharedKey {
    SharedKey::new(raw).unwrap()
}

// ============================================================================
// FRAME CODEC EDGE CASES
// ============================================================================

#[test]
fn test_testkey_vector_is_forty_bytes() {
    let payload = br#"{"a":1}"#;
    assert_eq!(payload.len(), 7);

    let framed = encode(payload, &key("testkey")).unwrap();
    assert_eq!(framed.len(), 33 + 7);
    assert_eq!(framed[0], 32);

    let decoded = decode(&framed, &key("testkey")).unwrap();
    assert_eq!(decoded, payload.to_vec());
}

#[test]
fn test_encoding_is_deterministic() {
    let a = encode(b"same", &key("k")).unwrap();
    let b = encode(b"same", &key("k")).unwrap();
    assert_eq!(to_hex(&a), to_hex(&b));
}

#[test]
fn test_exactly_header_sized_frame_is_empty_payload() {
    let framed = encode(b"", &key("k")).unwrap();
    let frame = Frame::parse(&framed).unwrap();
    assert_eq!(frame.digest.len(), 32);
    assert!(frame.payload.is_empty());
}

#[test]
fn test_length_byte_only() {
    let result = decode(&[32], &key("k"));
    match result {
        Err(RelayError::FrameTooShort { expected, actual }) => {
            assert_eq!(expected, 33);
            assert_eq!(actual, 1);
        }
        other => panic!("Unexpected result: {other:?}"),
    }
}

#[test]
fn test_length_byte_claims_more_than_received() {
    let mut bytes = vec![255u8];
    bytes.extend_from_slice(&[0xAA; 100]);
    assert!(matches!(
        decode(&bytes, &key("k")),
        Err(RelayError::FrameTooShort {
            expected: 256,
            actual: 101
        })
    ));
}

#[test]
fn test_large_payload_roundtrip() {
    let payload = vec![0x42; 5 * 1024 * 1024];
    let codec = FrameCodec::new(key("k"), DigestAlgorithm::Sha512);
    let framed = codec.encode(&payload).unwrap();
    assert_eq!(codec.decode(&framed).unwrap().len(), payload.len());
}

#[test]
fn test_appended_bytes_fail_authentication() {
    let mut framed = encode(b"payload", &key("k")).unwrap();
    framed.push(0);
    assert!(matches!(
        decode(&framed, &key("k")),
        Err(RelayError::AuthenticationFailure)
    ));
}

#[test]
fn test_truncated_payload_fails_authentication() {
    let framed = encode(b"payload", &key("k")).unwrap();
    let cut = &framed[..framed.len() - 1];
    assert!(matches!(
        decode(cut, &key("k")),
        Err(RelayError::AuthenticationFailure)
    ));
}

#[test]
fn test_case_sensitive_key() {
    let framed = encode(b"x", &key("Secret")).unwrap();
    assert!(decode(&framed, &key("secret")).is_err());
}

// ============================================================================
// PAYLOAD EDGE CASES
// ============================================================================

#[test]
fn test_non_utf8_payload_is_format_error() {
    let serializer = PayloadSerializer::new(false);
    assert!(matches!(
        serializer.deserialize(&[0xff, 0xfe, 0xfd]),
        Err(RelayError::PayloadFormat(_))
    ));
}

#[test]
fn test_empty_payload_is_format_error() {
    let serializer = PayloadSerializer::new(true);
    assert!(matches!(
        serializer.deserialize(b""),
        Err(RelayError::PayloadFormat(_))
    ));
}

#[test]
fn test_json_array_is_not_a_batch() {
    let serializer = PayloadSerializer::new(true);
    let err = serializer.deserialize(b"[1,2,3]").unwrap_err();
    assert!(matches!(err, RelayError::PayloadFormat(_)));
}

#[test]
fn test_unicode_monitor_names_survive() {
    let mut batch = BatchRecord::new();
    batch.insert("пинг-шлюз", MonitorRecord::new("MonitorPing", json!({"rtt_ms": 12.5})));
    batch.insert("disk ✓", MonitorRecord::new("MonitorDiskSpace", json!(null)));

    let serializer = PayloadSerializer::default();
    let bytes = serializer.serialize(&batch).unwrap();
    let (decoded, format) = serializer.deserialize(&bytes).unwrap();
    assert_eq!(decoded, batch);
    assert_eq!(format, PayloadFormat::Primary);
}

#[test]
fn test_full_pipeline_through_codec() {
    let mut batch = BatchRecord::new();
    batch.insert("http", MonitorRecord::new("MonitorHTTP", json!({"status": 200})));

    let serializer = PayloadSerializer::default();
    let codec = FrameCodec::new(key("pipeline"), DigestAlgorithm::Sha256);

    let framed = codec.encode(&serializer.serialize(&batch).unwrap()).unwrap();
    let payload = codec.decode(&framed).unwrap();
    let (decoded, _) = serializer.deserialize(payload).unwrap();
    assert_eq!(decoded, batch);
}
