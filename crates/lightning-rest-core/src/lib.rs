#![deny(unsafe_code)]

//! lightning-rest core: an HTTP/JSON gateway over the lightningd JSON-RPC
//! socket.
//!
//! A request flows through four stages:
//!
//! ```text
//! HTTP ─▶ router ─▶ params ─▶ RpcTransport ─▶ error/response ─▶ HTTP
//!         (which     (typed    (one call to     (verbatim result
//!         endpoint)  values)   the daemon)      or JSON error)
//! ```
//!
//! The gateway holds no Lightning state of its own. Everything the client
//! sees comes from the daemon.

use std::future::Future;
use std::pin::Pin;

/// Boxed `Send` future returned by [`rpc::RpcTransport`] methods, so the
/// transport can be shared as `Arc<dyn RpcTransport>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Endpoint table, request validation, routing, and error translation.
pub mod gateway;
/// JSON-RPC transport to the daemon.
pub mod rpc;
/// Server process: startup checks, listener, graceful shutdown.
pub mod server;

pub use gateway::{EndpointTable, GatewayError, GatewayState};
pub use rpc::{RpcCallError, RpcError, RpcTransport, TransportError, UnixSocketRpc};
pub use server::{Gateway, ServerError, ShutdownSignal};
