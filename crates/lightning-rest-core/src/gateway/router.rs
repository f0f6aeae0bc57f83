//! Method + path resolution against the endpoint table.

use axum::http::Method;

use super::endpoints::{Endpoint, EndpointTable, HttpMethod};
use super::error::GatewayError;

#[derive(Debug, Clone, Copy)]
enum Segment {
    Literal(&'static str),
    Capture(&'static str),
}

#[derive(Debug)]
struct CompiledRoute {
    endpoint: &'static Endpoint,
    segments: Vec<Segment>,
    literals: usize,
}

impl CompiledRoute {
    fn compile(endpoint: &'static Endpoint) -> Self {
        let segments: Vec<Segment> = split_path(endpoint.path)
            .map(|seg| {
                match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(name) => Segment::Capture(name),
                    None => Segment::Literal(seg),
                }
            })
            .collect();
        let literals = segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        Self {
            endpoint,
            segments,
            literals,
        }
    }

    /// Raw (still percent-encoded) captures if `path` fits this template.
    fn match_path(&self, path: &[&str]) -> Option<Vec<(&'static str, String)>> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut captures = Vec::new();
        for (seg, part) in self.segments.iter().zip(path) {
            match *seg {
                Segment::Literal(lit) if lit == *part => {}
                Segment::Literal(_) => return None,
                Segment::Capture(_) if part.is_empty() => return None,
                Segment::Capture(name) => captures.push((name, part.to_string())),
            }
        }
        Some(captures)
    }
}

/// Split a path into segments, ignoring one leading and one trailing slash.
fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed.split('/')
}

/// The endpoint a request resolved to.
#[derive(Debug, Clone)]
pub struct Matched {
    pub endpoint: &'static Endpoint,
    pub captures: Vec<(&'static str, String)>,
}

/// Resolves requests to endpoints.
#[derive(Debug)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    pub fn new(table: &EndpointTable) -> Self {
        Self {
            routes: table.endpoints().iter().map(CompiledRoute::compile).collect(),
        }
    }

    /// Find the endpoint for `method` and `path`.
    ///
    /// A path that exists under other methods yields `MethodNotAllowed`; a
    /// path that matches nothing yields `NotFound`. When several templates
    /// match, the one with the most literal segments wins.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<Matched, GatewayError> {
        let parts: Vec<&str> = split_path(path).collect();
        let wanted = HttpMethod::from_http(method);

        let mut best: Option<(&CompiledRoute, Vec<(&'static str, String)>)> = None;
        let mut allow: Vec<&'static str> = Vec::new();

        for route in &self.routes {
            let Some(captures) = route.match_path(&parts) else {
                continue;
            };
            if Some(route.endpoint.method) != wanted {
                let m = route.endpoint.method.as_str();
                if !allow.contains(&m) {
                    allow.push(m);
                }
                continue;
            }
            if best.as_ref().is_none_or(|(b, _)| route.literals > b.literals) {
                best = Some((route, captures));
            }
        }

        match best {
            Some((route, captures)) => Ok(Matched {
                endpoint: route.endpoint,
                captures,
            }),
            None if !allow.is_empty() => Err(GatewayError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
                allow,
            }),
            None => Err(GatewayError::NotFound {
                method: method.to_string(),
                path: path.to_string(),
            }),
        }
    }
}
