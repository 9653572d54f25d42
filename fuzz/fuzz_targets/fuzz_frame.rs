#![no_main]

use libfuzzer_sys::fuzz_target;
use monitor_relay::core::frame::{decode, Frame};
use monitor_relay::utils::crypto::SharedKey;

fuzz_target!(|data: &[u8]| {
    // Frame parsing and authentication must reject, never panic
    let _ = Frame::parse(data);
    if let Ok(key) = SharedKey::new("fuzz-key") {
        let _ = decode(data, &key);
    }
});
