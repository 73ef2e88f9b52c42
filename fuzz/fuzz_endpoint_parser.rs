//! Fuzz target for endpoint string resolution.
//!
//! Run with: cargo +nightly fuzz run fuzz_endpoint_parser

#![no_main]

use csi_mock_core::Endpoint;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(ep) = Endpoint::parse(s) {
        // A resolved endpoint always has somewhere to bind.
        assert!(!ep.address.is_empty());
    }
});
