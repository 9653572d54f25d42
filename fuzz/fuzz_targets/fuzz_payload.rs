#![no_main]

use libfuzzer_sys::fuzz_target;
use monitor_relay::core::serialization::PayloadSerializer;

fuzz_target!(|data: &[u8]| {
    // Both the strict and the legacy-enabled decoders see untrusted bytes
    let _ = PayloadSerializer::new(false).deserialize(data);
    let _ = PayloadSerializer::new(true).deserialize(data);
});
