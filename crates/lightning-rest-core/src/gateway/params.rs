//! Request validation: raw HTTP input to typed RPC parameters.
//!
//! Absent optional parameters are left out of the RPC call altogether. They
//! are never sent as `null`, zero, or an empty string, so the daemon can
//! always tell "not provided" from "provided as zero". Unknown fields are
//! ignored.

use percent_encoding::percent_decode_str;
use serde_json::{Map, Number, Value};

use super::endpoints::{Endpoint, Kind, ParamSpec, Presence, Source};

/// Why a request's parameters were rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("field `{field}` must be {expected}")]
    InvalidType {
        field: String,
        expected: &'static str,
    },

    #[error("field `{field}` must be one of {allowed:?}")]
    InvalidValue {
        field: String,
        allowed: &'static [&'static str],
    },

    #[error("request body must be empty or a JSON object: {detail}")]
    InvalidBody { detail: String },

    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

impl ValidationError {
    /// The offending field. Body-level problems report `body`.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingField { field }
            | ValidationError::InvalidType { field, .. }
            | ValidationError::InvalidValue { field, .. } => field,
            ValidationError::InvalidBody { .. } | ValidationError::TooLarge { .. } => "body",
        }
    }

    /// Stable machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::MissingField { .. } => "missing_field",
            ValidationError::InvalidType { .. } => "invalid_type",
            ValidationError::InvalidValue { .. } => "invalid_value",
            ValidationError::InvalidBody { .. } => "invalid_body",
            ValidationError::TooLarge { .. } => "too_large",
        }
    }
}

/// The raw inputs of one request, decoded but not yet typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestInput {
    /// Percent-decoded path captures.
    pub captures: Vec<(&'static str, String)>,
    /// Decoded query pairs, in request order.
    pub query: Vec<(String, String)>,
    /// Top-level body fields.
    pub body: Map<String, Value>,
}

impl RequestInput {
    /// Decode path captures, the query string, and the body.
    pub fn from_parts(
        captures: Vec<(&'static str, String)>,
        query: Option<&str>,
        body: &[u8],
    ) -> Result<Self, ValidationError> {
        let captures = captures
            .into_iter()
            .map(|(name, raw)| decode_component(&raw, false).map(|v| (name, v)).ok_or_else(|| {
                ValidationError::InvalidType {
                    field: name.to_string(),
                    expected: "valid UTF-8",
                }
            }))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            captures,
            query: parse_query(query.unwrap_or_default())?,
            body: parse_body(body)?,
        })
    }

    fn capture(&self, name: &str) -> Option<&str> {
        self.captures
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path captures win over any same-named query or body field.
    fn lookup(&self, spec: &ParamSpec) -> Option<Raw<'_>> {
        if let Some(v) = self.capture(spec.name) {
            return Some(Raw::Text(v));
        }
        match spec.source {
            Source::Path => None,
            Source::Query => self.query_value(spec.name).map(Raw::Text),
            Source::Body => match self.body.get(spec.name) {
                None | Some(Value::Null) => None,
                Some(v) => Some(Raw::Json(v)),
            },
        }
    }
}

/// Decode one URL component, optionally treating `+` as a space.
fn decode_component(raw: &str, plus_is_space: bool) -> Option<String> {
    let replaced;
    let raw = if plus_is_space && raw.contains('+') {
        replaced = raw.replace('+', " ");
        replaced.as_str()
    } else {
        raw
    };
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// Parse `a=1&b=two` into pairs. Keys without `=` get an empty value.
fn parse_query(query: &str) -> Result<Vec<(String, String)>, ValidationError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(key, true).ok_or_else(|| ValidationError::InvalidType {
                field: "query".to_string(),
                expected: "valid UTF-8",
            })?;
            let value =
                decode_component(value, true).ok_or_else(|| ValidationError::InvalidType {
                    field: key.clone(),
                    expected: "valid UTF-8",
                })?;
            Ok((key, value))
        })
        .collect()
}

fn parse_body(body: &[u8]) -> Result<Map<String, Value>, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ValidationError::InvalidBody {
            detail: format!("got {}", json_type(&other)),
        }),
        Err(e) => Err(ValidationError::InvalidBody {
            detail: e.to_string(),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A parameter value before type checking.
#[derive(Debug, Clone, Copy)]
enum Raw<'a> {
    /// From the path or query string; always textual.
    Text(&'a str),
    /// From the JSON body.
    Json(&'a Value),
}

impl<'a> Raw<'a> {
    fn as_text(&self) -> Option<&'a str> {
        match *self {
            Raw::Text(s) => Some(s),
            Raw::Json(Value::String(s)) => Some(s.as_str()),
            Raw::Json(_) => None,
        }
    }
}

/// Named parameters for one RPC call, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcParams(Map<String, Value>);

impl RpcParams {
    pub fn get(&self, rpc_name: &str) -> Option<&Value> {
        self.0.get(rpc_name)
    }

    pub fn contains(&self, rpc_name: &str) -> bool {
        self.0.contains_key(rpc_name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The JSON object sent as the call's `params`.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Type-check every parameter `endpoint` declares.
pub fn extract(endpoint: &Endpoint, input: &RequestInput) -> Result<RpcParams, ValidationError> {
    let mut params = Map::new();
    for spec in endpoint.params {
        let value = match input.lookup(spec) {
            Some(raw) => convert(spec, raw)?,
            None => match spec.presence {
                Presence::Required => {
                    return Err(ValidationError::MissingField {
                        field: spec.name.to_string(),
                    });
                }
                Presence::Optional => continue,
                Presence::Defaulted(value) => Value::String(value.to_string()),
            },
        };
        params.insert(spec.rpc_name.to_string(), value);
    }
    Ok(RpcParams(params))
}

fn convert(spec: &ParamSpec, raw: Raw<'_>) -> Result<Value, ValidationError> {
    let invalid = || ValidationError::InvalidType {
        field: spec.name.to_string(),
        expected: spec.kind.expected(),
    };

    match spec.kind {
        Kind::Text => raw
            .as_text()
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(invalid),
        Kind::Integer => integer(raw).map(Value::Number).ok_or_else(invalid),
        Kind::Number => number(raw).map(Value::Number).ok_or_else(invalid),
        Kind::Amount => match raw.as_text() {
            Some("any") => Ok(Value::String("any".to_string())),
            _ => integer(raw).map(Value::Number).ok_or_else(invalid),
        },
        Kind::OneOf(allowed) => {
            let s = raw.as_text().ok_or_else(invalid)?;
            if allowed.contains(&s) {
                Ok(Value::String(s.to_string()))
            } else {
                Err(ValidationError::InvalidValue {
                    field: spec.name.to_string(),
                    allowed,
                })
            }
        }
    }
}

fn integer(raw: Raw<'_>) -> Option<Number> {
    match raw {
        Raw::Json(Value::Number(n)) => n.as_u64().map(Number::from),
        _ => raw.as_text()?.trim().parse::<u64>().ok().map(Number::from),
    }
}

fn number(raw: Raw<'_>) -> Option<Number> {
    match raw {
        Raw::Json(Value::Number(n)) => n.as_f64().filter(|f| f.is_finite()).map(|_| n.clone()),
        _ => {
            let text = raw.as_text()?.trim();
            if let Ok(i) = text.parse::<i64>() {
                return Some(Number::from(i));
            }
            text.parse::<f64>().ok().and_then(Number::from_f64)
        }
    }
}
