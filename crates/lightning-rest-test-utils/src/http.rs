//! Minimal HTTP/1.1 client for driving a served gateway over TCP.

use std::net::SocketAddr;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::net::TcpStream;

/// A decoded gateway response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub request_id: Option<String>,
    pub body: Value,
}

/// Send one request to `addr` and decode the JSON response body.
///
/// `body` is sent verbatim with `Content-Type: application/json`. An empty
/// response body decodes as `Value::Null`.
pub async fn http_request(
    addr: SocketAddr,
    method: Method,
    path: &str,
    body: Option<&str>,
) -> HttpResponse {
    let stream = TcpStream::connect(addr)
        .await
        .expect("failed to connect to gateway");
    let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, Full<Bytes>>(
        TokioIo::new(stream),
    )
    .await
    .expect("HTTP handshake failed");

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::warn!(error = %e, "test HTTP connection error");
        }
    });

    let mut builder = hyper::Request::builder()
        .method(method)
        .uri(path)
        .header("host", addr.to_string());
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let payload = body
        .map(|b| Bytes::copy_from_slice(b.as_bytes()))
        .unwrap_or_default();
    let req = builder
        .body(Full::new(payload))
        .expect("failed to build request");

    let resp = sender.send_request(req).await.expect("request failed");
    let status = resp.status();
    let request_id = resp
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("failed to read response body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is not JSON")
    };

    HttpResponse {
        status,
        request_id,
        body,
    }
}
