//! JSON-RPC 2.0 wire types exchanged with the daemon.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RpcCallError;

/// An outgoing call. Parameters are always sent by name.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: &'a Value,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: &'a Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// A response as read off the socket.
///
/// Every field is optional on the wire. [`RpcResponse::into_result`] decides
/// what a given combination means.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// The numeric id this response answers, if it carries one.
    pub fn call_id(&self) -> Option<u64> {
        self.id.as_ref().and_then(Value::as_u64)
    }

    /// An error object wins over any result. A missing result reads as `null`.
    pub fn into_result(self) -> Result<Value, RpcCallError> {
        match self.error {
            Some(error) => Err(RpcCallError::Rpc(error)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// The error object of a JSON-RPC response, passed through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let params = json!({"id": "03abc"});
        let req = RpcRequest::new(7, "listpeers", &params);
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"jsonrpc": "2.0", "id": 7, "method": "listpeers", "params": {"id": "03abc"}})
        );
    }

    #[test]
    fn test_error_wins_over_result() {
        let resp: RpcResponse = serde_json::from_value(json!({
            "id": 1,
            "result": {"ignored": true},
            "error": {"code": -1, "message": "Unknown command"}
        }))
        .unwrap();
        match resp.into_result() {
            Err(RpcCallError::Rpc(err)) => assert_eq!(err, RpcError::new(-1, "Unknown command")),
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_result_is_null() {
        let resp: RpcResponse = serde_json::from_value(json!({"jsonrpc": "2.0", "id": 3})).unwrap();
        assert_eq!(resp.call_id(), Some(3));
        assert_eq!(resp.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_error_data_preserved() {
        let err: RpcError = serde_json::from_value(json!({
            "code": 905,
            "message": "Unknown invoice",
            "data": {"label": "l1"}
        }))
        .unwrap();
        assert_eq!(err.data, Some(json!({"label": "l1"})));
        assert_eq!(err.to_string(), "Unknown invoice (code 905)");
    }

    #[test]
    fn test_non_numeric_id() {
        let resp: RpcResponse = serde_json::from_value(json!({"id": "abc", "result": {}})).unwrap();
        assert_eq!(resp.call_id(), None);
    }
}
