//! The persisted routing unit.

use std::fmt;
use std::str::FromStr;

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::routing::pattern::PathPattern;

/// HTTP methods a route may be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Trace,
}

impl RequestMethod {
    pub const ALL: [RequestMethod; 7] = [
        RequestMethod::Get,
        RequestMethod::Head,
        RequestMethod::Post,
        RequestMethod::Put,
        RequestMethod::Delete,
        RequestMethod::Options,
        RequestMethod::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "get",
            RequestMethod::Head => "head",
            RequestMethod::Post => "post",
            RequestMethod::Put => "put",
            RequestMethod::Delete => "delete",
            RequestMethod::Options => "options",
            RequestMethod::Trace => "trace",
        }
    }

    /// Map an inbound HTTP method; `None` for anything outside the allowed set.
    pub fn from_http(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(RequestMethod::Get),
            Method::HEAD => Some(RequestMethod::Head),
            Method::POST => Some(RequestMethod::Post),
            Method::PUT => Some(RequestMethod::Put),
            Method::DELETE => Some(RequestMethod::Delete),
            Method::OPTIONS => Some(RequestMethod::Options),
            Method::TRACE => Some(RequestMethod::Trace),
            _ => None,
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method name is not in the allowed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl FromStr for RequestMethod {
    type Err = UnknownMethod;

    /// Parses the lower-case method name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// A rule mapping a source path pattern and HTTP method to a target URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: String,
    pub source_path: String,
    #[serde(alias = "targetURL")]
    pub target_url: String,
    pub request_method: RequestMethod,
    /// Parameter and wildcard tokens of `source_path`, in path order.
    #[serde(default)]
    pub segments: Vec<String>,
}

impl Route {
    /// Build a route from an already validated pattern; `segments` is derived here.
    pub fn new(
        id: impl Into<String>,
        source: &PathPattern,
        target_url: impl Into<String>,
        request_method: RequestMethod,
    ) -> Self {
        Self {
            id: id.into(),
            source_path: source.to_string(),
            target_url: target_url.into(),
            request_method,
            segments: source.tokens(),
        }
    }
}
