//! Fuzz target for request decoding and parameter validation.
//!
//! Run with: cargo +nightly fuzz run fuzz_request_params
//!
//! The first byte picks an endpoint, the second splits the rest into a raw
//! query string and a raw body. Decoding and type checking must never panic,
//! and whatever they accept must only carry parameters the endpoint declares.

#![no_main]

use lightning_rest_core::gateway::endpoints::ENDPOINTS;
use lightning_rest_core::gateway::params::{self, RequestInput};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let endpoint = &ENDPOINTS[data[0] as usize % ENDPOINTS.len()];
    let rest = &data[2..];
    let split = (data[1] as usize).min(rest.len());
    let (query, body) = rest.split_at(split);
    let Ok(query) = std::str::from_utf8(query) else {
        return;
    };

    let captures = endpoint
        .captures()
        .map(|name| (name, String::from_utf8_lossy(body).into_owned()))
        .collect();

    let Ok(input) = RequestInput::from_parts(captures, Some(query), body) else {
        return;
    };
    if let Ok(params) = params::extract(endpoint, &input) {
        assert!(params.len() <= endpoint.params.len());
        for spec in endpoint.params {
            if params.contains(spec.rpc_name) {
                continue;
            }
            assert!(matches!(
                spec.presence,
                lightning_rest_core::gateway::Presence::Optional
            ));
        }
    }
});
