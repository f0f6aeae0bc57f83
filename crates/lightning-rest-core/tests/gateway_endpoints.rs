//! Route-level tests: every endpoint against a recording mock transport.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use lightning_rest_core::Gateway;
use lightning_rest_test_utils::config::TestConfigBuilder;
use lightning_rest_test_utils::mock::MockRpc;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

fn gateway() -> (Gateway, Arc<MockRpc>) {
    let rpc = Arc::new(MockRpc::new());
    let gateway = Gateway::with_transport(TestConfigBuilder::new().build(), rpc.clone()).unwrap();
    (gateway, rpc)
}

async fn send(
    gateway: &Gateway,
    method: Method,
    uri: &str,
    body: Option<&str>,
) -> (StatusCode, HeaderMap, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if body.is_some() {
        req = req.header(header::CONTENT_TYPE, "application/json");
    }
    let req = req
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let resp = gateway.app().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_every_endpoint_forwards_its_mapping() {
    let cases: &[(Method, &str, Option<&str>, &str, Value)] = &[
        (Method::GET, "/api/getinfo", None, "getinfo", json!({})),
        (
            Method::POST,
            "/api/connect/03abc",
            Some(r#"{"host":"10.0.0.1","port":9735}"#),
            "connect",
            json!({"id": "03abc", "host": "10.0.0.1", "port": 9735}),
        ),
        (Method::GET, "/api/nodes", None, "listnodes", json!({})),
        (
            Method::GET,
            "/api/channels?short_channel_id=103x1x0",
            None,
            "listchannels",
            json!({"short_channel_id": "103x1x0"}),
        ),
        (Method::GET, "/api/peers", None, "listpeers", json!({})),
        (
            Method::GET,
            "/api/peers/03abc",
            None,
            "listpeers",
            json!({"id": "03abc"}),
        ),
        (Method::GET, "/api/funds", None, "listfunds", json!({})),
        (
            Method::GET,
            "/api/routes/03abc?msatoshi=5000&riskfactor=0.5&cltv=9",
            None,
            "getroute",
            json!({"id": "03abc", "msatoshi": 5000, "riskfactor": 0.5, "cltv": 9}),
        ),
        (Method::GET, "/api/invoices", None, "listinvoices", json!({})),
        (
            Method::GET,
            "/api/invoices/l1",
            None,
            "listinvoices",
            json!({"label": "l1"}),
        ),
        (
            Method::POST,
            "/api/invoices",
            Some(r#"{"msatoshi":"any","label":"l2","description":"tip","expiry":60}"#),
            "invoice",
            json!({"msatoshi": "any", "label": "l2", "description": "tip", "expiry": 60}),
        ),
        (
            Method::DELETE,
            "/api/invoices/l1",
            Some(r#"{"status":"unpaid"}"#),
            "delinvoice",
            json!({"label": "l1", "status": "unpaid"}),
        ),
        (
            Method::GET,
            "/api/payments?payment_hash=ab12",
            None,
            "listpayments",
            json!({"payment_hash": "ab12"}),
        ),
        (
            Method::POST,
            "/api/payments/decode",
            Some(r#"{"bolt11":"lnbc1"}"#),
            "decodepay",
            json!({"bolt11": "lnbc1"}),
        ),
        (
            Method::POST,
            "/api/payments/add",
            Some(r#"{"bolt11":"lnbc1","msatoshi":42,"riskfactor":1}"#),
            "pay",
            json!({"bolt11": "lnbc1", "msatoshi": 42, "riskfactor": 1}),
        ),
        (
            Method::POST,
            "/api/addr/new?addrtype=bech32",
            None,
            "newaddr",
            json!({"addrtype": "bech32"}),
        ),
        (
            Method::GET,
            "/api/dev/blockheight",
            None,
            "dev-blockheight",
            json!({}),
        ),
        (
            Method::POST,
            "/api/dev/setfees",
            Some(r#"{"immediate":100,"slow":2}"#),
            "dev-setfees",
            json!({"immediate": 100, "slow": 2}),
        ),
    ];

    for (method, uri, body, rpc_method, params) in cases {
        let (gateway, rpc) = gateway();
        let (status, _, _) = send(&gateway, method.clone(), uri, *body).await;
        assert_eq!(status, StatusCode::OK, "{method} {uri}");

        let calls = rpc.calls();
        assert_eq!(calls.len(), 1, "{method} {uri} made {} calls", calls.len());
        assert_eq!(calls[0].method, *rpc_method, "{method} {uri}");
        assert_eq!(calls[0].params, *params, "{method} {uri}");
    }
}

#[tokio::test]
async fn test_result_passes_through_unchanged() {
    let (gateway, rpc) = gateway();
    let peers = json!({"peers": [{"id": "03abc", "connected": true}]});
    rpc.reply_ok(peers.clone());

    let (status, headers, body) = send(&gateway, Method::GET, "/api/peers/03abc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, peers);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(rpc.last_call().params, json!({"id": "03abc"}));
}

#[tokio::test]
async fn test_result_keeps_daemon_field_order() {
    let (gateway, rpc) = gateway();
    rpc.reply_ok(json!({"zeta": 1, "alpha": {"nested_Key": 2}, "mid": [3]}));

    let resp = gateway
        .app()
        .oneshot(Request::get("/api/getinfo").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(
        std::str::from_utf8(&bytes).unwrap(),
        r#"{"zeta":1,"alpha":{"nested_Key":2},"mid":[3]}"#
    );
}

#[tokio::test]
async fn test_invoice_without_expiry_omits_it() {
    let (gateway, rpc) = gateway();
    let (status, _, _) = send(
        &gateway,
        Method::POST,
        "/api/invoices",
        Some(r#"{"msatoshi":1000,"label":"l1","description":"d"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let call = rpc.last_call();
    assert_eq!(call.method, "invoice");
    assert_eq!(
        call.params,
        json!({"msatoshi": 1000, "label": "l1", "description": "d"})
    );
    assert!(call.params.get("expiry").is_none());
}

#[tokio::test]
async fn test_channels_without_filter_sends_no_filter() {
    let (gateway, rpc) = gateway();
    send(&gateway, Method::GET, "/api/channels", None).await;
    assert_eq!(rpc.last_call().params, json!({}));
}

#[tokio::test]
async fn test_explicit_null_counts_as_absent() {
    let (gateway, rpc) = gateway();
    send(
        &gateway,
        Method::POST,
        "/api/invoices",
        Some(r#"{"msatoshi":1,"label":"l","description":"d","expiry":null}"#),
    )
    .await;
    assert!(rpc.last_call().params.get("expiry").is_none());
}

#[tokio::test]
async fn test_addrtype_defaults_to_p2sh_segwit() {
    let (gateway, rpc) = gateway();
    let (status, _, _) = send(&gateway, Method::POST, "/api/addr/new", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        rpc.last_call().params,
        json!({"addrtype": "p2sh-segwit"})
    );
}

#[tokio::test]
async fn test_query_numbers_are_typed() {
    let (gateway, rpc) = gateway();
    send(
        &gateway,
        Method::GET,
        "/api/routes/03abc?msatoshi=1000&riskfactor=10",
        None,
    )
    .await;
    let params = rpc.last_call().params;
    assert_eq!(params["msatoshi"], json!(1000));
    assert_eq!(params["riskfactor"], json!(10));
    assert!(params.get("cltv").is_none());
}

#[tokio::test]
async fn test_path_capture_is_percent_decoded() {
    let (gateway, rpc) = gateway();
    send(&gateway, Method::GET, "/api/invoices/my%20label", None).await;
    assert_eq!(rpc.last_call().params, json!({"label": "my label"}));
}

#[tokio::test]
async fn test_missing_host_is_rejected_before_any_call() {
    let (gateway, rpc) = gateway();
    let (status, _, body) = send(
        &gateway,
        Method::POST,
        "/api/connect/03abc",
        Some(r#"{"port":9735}"#),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!(-32602));
    assert_eq!(body["error"]["field"], json!("host"));
    assert_eq!(body["error"]["reason"], json!("missing_field"));
    assert_eq!(rpc.call_count(), 0);
}

#[tokio::test]
async fn test_wrong_types_are_rejected() {
    let (gateway, rpc) = gateway();

    let (status, _, body) = send(
        &gateway,
        Method::POST,
        "/api/invoices",
        Some(r#"{"msatoshi":-5,"label":"l","description":"d"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], json!("msatoshi"));
    assert_eq!(body["error"]["reason"], json!("invalid_type"));

    let (status, _, body) = send(
        &gateway,
        Method::GET,
        "/api/routes/03abc?msatoshi=lots&riskfactor=1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], json!("msatoshi"));

    let (status, _, body) = send(
        &gateway,
        Method::POST,
        "/api/addr/new?addrtype=legacy",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], json!("addrtype"));
    assert_eq!(body["error"]["reason"], json!("invalid_value"));

    assert_eq!(rpc.call_count(), 0);
}

#[tokio::test]
async fn test_empty_filter_is_rejected_not_forwarded() {
    let (gateway, rpc) = gateway();
    for uri in [
        "/api/channels?short_channel_id=",
        "/api/payments?bolt11=",
        "/api/payments?payment_hash=",
    ] {
        let (status, _, body) = send(&gateway, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"]["reason"], json!("invalid_type"), "{uri}");
    }
    assert_eq!(rpc.call_count(), 0);
}

#[tokio::test]
async fn test_non_object_body_is_rejected() {
    let (gateway, rpc) = gateway();
    let (status, _, body) = send(
        &gateway,
        Method::POST,
        "/api/payments/decode",
        Some(r#"["lnbc1"]"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], json!("body"));
    assert_eq!(body["error"]["reason"], json!("invalid_body"));
    assert_eq!(rpc.call_count(), 0);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let rpc = Arc::new(MockRpc::new());
    let config = TestConfigBuilder::new().max_body_bytes(32).build();
    let gateway = Gateway::with_transport(config, rpc.clone()).unwrap();

    let big = format!(r#"{{"bolt11":"{}"}}"#, "x".repeat(64));
    let (status, _, body) = send(&gateway, Method::POST, "/api/payments/decode", Some(&big)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], json!(-32602));
    assert_eq!(rpc.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_command_maps_to_bad_gateway() {
    let (gateway, rpc) = gateway();
    rpc.reply_error(-1, "Unknown command");

    let (status, _, body) = send(&gateway, Method::GET, "/api/dev/blockheight", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        body,
        json!({"error": {"code": -1, "message": "Unknown command"}})
    );
}

#[tokio::test]
async fn test_daemon_error_codes_are_classified() {
    let (gateway, rpc) = gateway();
    rpc.reply_error(905, "Unknown invoice")
        .reply_error(-32602, "label: should be a string");

    let (status, _, body) = send(&gateway, Method::DELETE, "/api/invoices/gone", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!(905));

    let (status, _, _) = send(&gateway, Method::GET, "/api/invoices/x", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_configured_not_found_codes() {
    let rpc = Arc::new(MockRpc::new());
    let config = TestConfigBuilder::new().not_found_codes(&[1000]).build();
    let gateway = Gateway::with_transport(config, rpc.clone()).unwrap();
    rpc.reply_error(1000, "no such thing").reply_error(905, "Unknown invoice");

    let (status, _, _) = send(&gateway, Method::GET, "/api/invoices/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = send(&gateway, Method::GET, "/api/invoices/b", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_transport_failure_is_service_unavailable() {
    let (gateway, rpc) = gateway();
    rpc.reply_unavailable();

    let (status, _, body) = send(&gateway, Method::GET, "/api/getinfo", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body,
        json!({"error": {"code": -32603, "message": "upstream unavailable"}})
    );

    // The gateway keeps serving once the daemon is back.
    let (status, _, _) = send(&gateway, Method::GET, "/api/getinfo", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let (gateway, rpc) = gateway();
    let (status, _, body) = send(&gateway, Method::GET, "/api/healthz", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!(-32601));
    assert!(body["error"]["message"].as_str().unwrap().contains("/api/healthz"));
    assert_eq!(rpc.call_count(), 0);
}

#[tokio::test]
async fn test_wrong_method_is_not_allowed() {
    let (gateway, rpc) = gateway();
    let (status, headers, body) = send(&gateway, Method::POST, "/api/getinfo", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers[header::ALLOW], "GET");
    assert_eq!(body["error"]["code"], json!(-32601));
    assert_eq!(rpc.call_count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_every_response_carries_request_id() {
    let (gateway, _rpc) = gateway();

    let (_, first, _) = send(&gateway, Method::GET, "/api/getinfo", None).await;
    let (_, second, _) = send(&gateway, Method::GET, "/api/nope", None).await;

    let first = first["x-request-id"].to_str().unwrap().to_string();
    let second = second["x-request-id"].to_str().unwrap().to_string();
    assert!(!first.is_empty());
    assert_ne!(first, second);
}
