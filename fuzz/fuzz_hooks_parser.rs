//! Fuzz target for the strict YAML hooks parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_hooks_parser

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = csi_mock_config::Hooks::parse(s);
    }
});
