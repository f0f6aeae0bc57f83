//! The one generic handler every request goes through.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use lightning_rest_config::AppConfig;
use tracing::{Instrument, debug, info_span};

use super::endpoints::{Endpoint, EndpointTable};
use super::error::{ErrorClassifier, GatewayError};
use super::params::{self, RequestInput, RpcParams, ValidationError};
use super::router::Router;
use crate::rpc::RpcTransport;

/// Response header carrying the request's correlation id.
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Shared, read-only state handed to every request.
pub struct GatewayState {
    pub rpc: Arc<dyn RpcTransport>,
    pub router: Router,
    pub classifier: ErrorClassifier,
    pub max_body_bytes: usize,
    next_request_id: AtomicU64,
}

impl GatewayState {
    pub fn new(rpc: Arc<dyn RpcTransport>, table: &EndpointTable, config: &AppConfig) -> Self {
        Self {
            rpc,
            router: Router::new(table),
            classifier: ErrorClassifier::from_config(&config.errors),
            max_body_bytes: config.server.max_body_bytes,
            next_request_id: AtomicU64::new(1),
        }
    }
}

/// Everything one request carries to the daemon, owned by its handler.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: u64,
    pub endpoint: &'static Endpoint,
    pub params: RpcParams,
}

/// Build the axum app. All routing happens in [`Router`], so the whole
/// table sits behind axum's fallback.
pub fn app(state: Arc<GatewayState>) -> axum::Router {
    axum::Router::new().fallback(handle).with_state(state)
}

async fn handle(State(state): State<Arc<GatewayState>>, request: Request) -> Response {
    let request_id = state.next_request_id.fetch_add(1, Ordering::Relaxed);
    let span = info_span!(
        "request",
        request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = dispatch(&state, request_id, request)
        .instrument(span)
        .await
        .unwrap_or_else(IntoResponse::into_response);
    response
        .headers_mut()
        .insert(REQUEST_ID_HEADER.clone(), HeaderValue::from(request_id));
    response
}

async fn dispatch(
    state: &GatewayState,
    request_id: u64,
    request: Request,
) -> Result<Response, GatewayError> {
    let (parts, body) = request.into_parts();
    let matched = state.router.resolve(&parts.method, parts.uri.path())?;

    let limit = state.max_body_bytes;
    let declared_len = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > limit) {
        return Err(ValidationError::TooLarge { limit }.into());
    }
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| ValidationError::TooLarge { limit })?;

    let input = RequestInput::from_parts(matched.captures, parts.uri.query(), &bytes)?;
    let params = params::extract(matched.endpoint, &input)?;

    forward(
        state,
        RequestContext {
            request_id,
            endpoint: matched.endpoint,
            params,
        },
    )
    .await
}

/// Make the single daemon call for a validated request.
async fn forward(state: &GatewayState, ctx: RequestContext) -> Result<Response, GatewayError> {
    let method = ctx.endpoint.rpc_method;
    debug!(rpc = method, params = ctx.params.len(), "Forwarding to daemon");

    match state.rpc.call(method, ctx.params.into_value()).await {
        Ok(result) => {
            debug!(rpc = method, request_id = ctx.request_id, "Daemon call succeeded");
            Ok(Json(result).into_response())
        }
        Err(err) => {
            let err = state.classifier.translate(method, err);
            debug!(rpc = method, status = %err.status(), "Daemon call failed");
            Err(err)
        }
    }
}
