//! Daemon RPC: JSON-RPC 2.0 over the daemon's Unix domain socket.
//!
//! The gateway talks to the daemon through the [`RpcTransport`] trait. The
//! production implementation is [`UnixSocketRpc`]. Tests substitute a
//! recording mock.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  write (short lock)   ┌──────────────┐
//! │ HTTP handler │──────────────────────▶│              │
//! │ HTTP handler │   {"id":7,...}        │  lightningd  │
//! │ HTTP handler │◀──────┐               │              │
//! └──────────────┘       │               └──────┬───────┘
//!                 oneshot by id                 │ responses, any order
//!                 ┌──────┴───────┐              │
//!                 │ reader task  │◀─────────────┘
//!                 └──────────────┘
//! ```

pub mod signatures;
pub mod types;
pub mod unix;

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;

use crate::BoxFuture;

pub use types::{RpcError, RpcRequest, RpcResponse};
pub use unix::UnixSocketRpc;

/// Failures below the JSON-RPC layer: the daemon could not be reached or the
/// conversation with it broke down.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to daemon socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("connection to daemon closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed daemon response: {0}")]
    Protocol(String),

    #[error("daemon did not answer within {0:?}")]
    Timeout(Duration),
}

/// Outcome of a failed [`RpcTransport::call`].
#[derive(Debug, thiserror::Error)]
pub enum RpcCallError {
    /// The daemon answered with a JSON-RPC error object.
    #[error("daemon returned error: {0}")]
    Rpc(RpcError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A connection to the daemon that can carry concurrent calls.
///
/// Implementations must be `Send + Sync`: one handle is shared by every
/// in-flight HTTP request. Uses `BoxFuture` for object safety (allows
/// `Arc<dyn RpcTransport>`).
pub trait RpcTransport: Send + Sync {
    /// Invoke `method` with a named-parameter object and return its result.
    fn call<'a>(
        &'a self,
        method: &'a str,
        params: Value,
    ) -> BoxFuture<'a, Result<Value, RpcCallError>>;

    /// Release the connection. Calls made afterwards fail.
    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}
