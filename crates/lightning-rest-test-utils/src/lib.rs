#![deny(unsafe_code)]

//! Shared test utilities for the lightning-rest workspace.
//!
//! Provides a recording mock transport, a scripted fake daemon on a real
//! Unix socket, config builders, and tracing helpers so that individual
//! crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! lightning-rest-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod daemon;
pub mod http;
pub mod mock;
pub mod tracing_setup;
