//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary text through `AppConfig::parse()`, which covers TOML
//! decoding and every validation rule.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = lightning_rest_config::AppConfig::parse(s) {
            // Anything that parses must also re-validate and resolve a socket path.
            assert!(config.validate().is_ok());
            let _ = config.rpc.resolved_socket_path();
        }
    }
});
