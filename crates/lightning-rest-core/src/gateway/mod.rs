//! The HTTP side of the gateway.
//!
//! [`endpoints`] declares every route as data. [`router`] resolves a method
//! and path to one of them, [`params`] turns the raw request into typed RPC
//! parameters, and [`dispatch`] makes the single daemon call and hands the
//! outcome to [`error`] for translation.

pub mod dispatch;
pub mod endpoints;
pub mod error;
pub mod params;
pub mod router;

pub use dispatch::{GatewayState, RequestContext, app};
pub use endpoints::{Endpoint, EndpointTable, HttpMethod, Kind, ParamSpec, Presence, Source};
pub use error::{ErrorBody, ErrorClassifier, GatewayError};
pub use params::{RequestInput, RpcParams, ValidationError};
pub use router::Router;
