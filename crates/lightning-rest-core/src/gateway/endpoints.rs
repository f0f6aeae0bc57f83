//! The declarative endpoint table.
//!
//! Each [`Endpoint`] maps one HTTP method and path template to exactly one
//! daemon RPC method, along with the parameters it forwards. Dispatch is a
//! single generic routine over this table; there are no per-route handlers.

use std::fmt;

use crate::rpc::signatures;

/// HTTP methods the gateway serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Map an incoming request method. `None` for methods never served.
    pub fn from_http(method: &axum::http::Method) -> Option<Self> {
        match *method {
            axum::http::Method::GET => Some(HttpMethod::Get),
            axum::http::Method::POST => Some(HttpMethod::Post),
            axum::http::Method::DELETE => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Path,
    Query,
    Body,
}

/// The type a parameter value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A non-empty string.
    Text,
    /// A non-negative integer.
    Integer,
    /// A finite number, integer or fractional.
    Number,
    /// A non-negative integer amount, or the literal `"any"`.
    Amount,
    /// One of a fixed set of strings.
    OneOf(&'static [&'static str]),
}

impl Kind {
    /// Human-readable description used in validation messages.
    pub fn expected(&self) -> &'static str {
        match self {
            Kind::Text => "a non-empty string",
            Kind::Integer => "a non-negative integer",
            Kind::Number => "a number",
            Kind::Amount => "a non-negative integer or \"any\"",
            Kind::OneOf(_) => "a string",
        }
    }
}

/// What happens when a parameter is not supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Reject the request.
    Required,
    /// Leave the parameter out of the RPC call entirely.
    Optional,
    /// Forward this string value instead.
    Defaulted(&'static str),
}

/// One parameter of an endpoint and how it maps onto the RPC call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// Name in the HTTP request (path capture, query key, or body field).
    pub name: &'static str,
    /// Name of the daemon's parameter.
    pub rpc_name: &'static str,
    pub source: Source,
    pub kind: Kind,
    pub presence: Presence,
}

impl ParamSpec {
    const fn new(name: &'static str, source: Source, kind: Kind) -> Self {
        Self {
            name,
            rpc_name: name,
            source,
            kind,
            presence: Presence::Required,
        }
    }

    /// A required string path capture.
    pub const fn path(name: &'static str) -> Self {
        Self::new(name, Source::Path, Kind::Text)
    }

    /// A required query-string parameter.
    pub const fn query(name: &'static str, kind: Kind) -> Self {
        Self::new(name, Source::Query, kind)
    }

    /// A required body field.
    pub const fn body(name: &'static str, kind: Kind) -> Self {
        Self::new(name, Source::Body, kind)
    }

    pub const fn optional(mut self) -> Self {
        self.presence = Presence::Optional;
        self
    }

    pub const fn or_default(mut self, value: &'static str) -> Self {
        self.presence = Presence::Defaulted(value);
        self
    }

    /// Forward under a different name than the HTTP one.
    pub const fn rpc(mut self, rpc_name: &'static str) -> Self {
        self.rpc_name = rpc_name;
        self
    }
}

/// A route and the daemon call it forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub method: HttpMethod,
    /// Path template; `{name}` segments are captures.
    pub path: &'static str,
    pub rpc_method: &'static str,
    pub params: &'static [ParamSpec],
}

impl Endpoint {
    pub const fn new(
        method: HttpMethod,
        path: &'static str,
        rpc_method: &'static str,
        params: &'static [ParamSpec],
    ) -> Self {
        Self {
            method,
            path,
            rpc_method,
            params,
        }
    }

    /// `"GET /api/peers/{peer_id}"`, for diagnostics.
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Names of the `{capture}` segments of the path template, in order.
    pub fn captures(&self) -> impl Iterator<Item = &'static str> + use<> {
        let path: &'static str = self.path;
        path.split('/')
            .filter_map(|seg| seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
    }
}

const ADDR_TYPES: &[&str] = &["bech32", "p2sh-segwit"];
const INVOICE_STATUSES: &[&str] = &["paid", "expired", "unpaid"];

use HttpMethod::{Delete, Get, Post};

/// Every route the gateway serves.
pub static ENDPOINTS: &[Endpoint] = &[
    Endpoint::new(Get, "/api/getinfo", "getinfo", &[]),
    Endpoint::new(
        Post,
        "/api/connect/{peer_id}",
        "connect",
        &[
            ParamSpec::path("peer_id").rpc("id"),
            ParamSpec::body("host", Kind::Text),
            ParamSpec::body("port", Kind::Integer).optional(),
        ],
    ),
    Endpoint::new(Get, "/api/nodes", "listnodes", &[]),
    Endpoint::new(
        Get,
        "/api/channels",
        "listchannels",
        &[ParamSpec::query("short_channel_id", Kind::Text).optional()],
    ),
    Endpoint::new(Get, "/api/peers", "listpeers", &[]),
    Endpoint::new(
        Get,
        "/api/peers/{peer_id}",
        "listpeers",
        &[ParamSpec::path("peer_id").rpc("id")],
    ),
    Endpoint::new(Get, "/api/funds", "listfunds", &[]),
    Endpoint::new(
        Get,
        "/api/routes/{peer_id}",
        "getroute",
        &[
            ParamSpec::path("peer_id").rpc("id"),
            ParamSpec::query("msatoshi", Kind::Integer),
            ParamSpec::query("riskfactor", Kind::Number),
            ParamSpec::query("cltv", Kind::Integer).optional(),
        ],
    ),
    Endpoint::new(Get, "/api/invoices", "listinvoices", &[]),
    Endpoint::new(
        Get,
        "/api/invoices/{label}",
        "listinvoices",
        &[ParamSpec::path("label")],
    ),
    Endpoint::new(
        Post,
        "/api/invoices",
        "invoice",
        &[
            ParamSpec::body("msatoshi", Kind::Amount),
            ParamSpec::body("label", Kind::Text),
            ParamSpec::body("description", Kind::Text),
            ParamSpec::body("expiry", Kind::Integer).optional(),
        ],
    ),
    Endpoint::new(
        Delete,
        "/api/invoices/{label}",
        "delinvoice",
        &[
            ParamSpec::path("label"),
            ParamSpec::body("status", Kind::OneOf(INVOICE_STATUSES)).optional(),
        ],
    ),
    Endpoint::new(
        Get,
        "/api/payments",
        "listpayments",
        &[
            ParamSpec::query("bolt11", Kind::Text).optional(),
            ParamSpec::query("payment_hash", Kind::Text).optional(),
        ],
    ),
    Endpoint::new(
        Post,
        "/api/payments/decode",
        "decodepay",
        &[
            ParamSpec::body("bolt11", Kind::Text),
            ParamSpec::body("description", Kind::Text).optional(),
        ],
    ),
    Endpoint::new(
        Post,
        "/api/payments/add",
        "pay",
        &[
            ParamSpec::body("bolt11", Kind::Text),
            ParamSpec::body("msatoshi", Kind::Integer).optional(),
            ParamSpec::body("description", Kind::Text).optional(),
            ParamSpec::body("riskfactor", Kind::Number).optional(),
        ],
    ),
    Endpoint::new(
        Post,
        "/api/addr/new",
        "newaddr",
        &[ParamSpec::query("addrtype", Kind::OneOf(ADDR_TYPES)).or_default("p2sh-segwit")],
    ),
    Endpoint::new(Get, "/api/dev/blockheight", "dev-blockheight", &[]),
    Endpoint::new(
        Post,
        "/api/dev/setfees",
        "dev-setfees",
        &[
            ParamSpec::body("immediate", Kind::Integer).optional(),
            ParamSpec::body("normal", Kind::Integer).optional(),
            ParamSpec::body("slow", Kind::Integer).optional(),
        ],
    ),
];

/// Inconsistencies in an endpoint table, found at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("{route}: unknown daemon method `{method}`")]
    UnknownMethod { route: String, method: String },

    #[error("{route}: `{method}` does not accept parameter `{param}`")]
    UnknownParam {
        route: String,
        method: String,
        param: String,
    },

    #[error("{route}: parameter `{param}` is mapped more than once")]
    DuplicateParam { route: String, param: String },

    #[error("{route}: path capture `{capture}` has no path parameter")]
    UnboundCapture { route: String, capture: String },

    #[error("{route}: path parameter `{param}` does not appear in the template")]
    MissingCapture { route: String, param: String },

    #[error("{route}: declared more than once")]
    DuplicateRoute { route: String },
}

/// A checked set of endpoints.
#[derive(Debug, Clone, Copy)]
pub struct EndpointTable {
    endpoints: &'static [Endpoint],
}

impl EndpointTable {
    pub fn new(endpoints: &'static [Endpoint]) -> Self {
        Self { endpoints }
    }

    /// The gateway's full route table.
    pub fn standard() -> Self {
        Self::new(ENDPOINTS)
    }

    pub fn endpoints(&self) -> &'static [Endpoint] {
        self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Verify that every endpoint forwards exactly what it declares, and
    /// only parameters its daemon method accepts.
    pub fn check(&self) -> Result<(), TableError> {
        for (i, ep) in self.endpoints.iter().enumerate() {
            let route = ep.route();

            if self.endpoints[..i]
                .iter()
                .any(|other| other.method == ep.method && other.path == ep.path)
            {
                return Err(TableError::DuplicateRoute { route });
            }

            let Some(signature) = signatures::lookup(ep.rpc_method) else {
                return Err(TableError::UnknownMethod {
                    route,
                    method: ep.rpc_method.to_string(),
                });
            };

            for (j, spec) in ep.params.iter().enumerate() {
                if !signature.accepts(spec.rpc_name) {
                    return Err(TableError::UnknownParam {
                        route,
                        method: ep.rpc_method.to_string(),
                        param: spec.rpc_name.to_string(),
                    });
                }
                if ep.params[..j]
                    .iter()
                    .any(|p| p.rpc_name == spec.rpc_name || p.name == spec.name)
                {
                    return Err(TableError::DuplicateParam {
                        route,
                        param: spec.name.to_string(),
                    });
                }
                if spec.source == Source::Path && !ep.captures().any(|c| c == spec.name) {
                    return Err(TableError::MissingCapture {
                        route,
                        param: spec.name.to_string(),
                    });
                }
            }

            for capture in ep.captures() {
                let bound = ep
                    .params
                    .iter()
                    .any(|p| p.source == Source::Path && p.name == capture);
                if !bound {
                    return Err(TableError::UnboundCapture {
                        route,
                        capture: capture.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
