//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary input to `AppConfig::parse()`; anything that validates
//! must also yield a usable timeout and listen address.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = pipey_config::AppConfig::parse(s) {
            let _ = config.timeout();
            assert!(!config.listen_addr().is_empty());
        }
    }
});
