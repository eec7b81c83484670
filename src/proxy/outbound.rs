//! Outbound request model.
//!
//! Only the state enumerated here crosses the proxy boundary: the re-escaped
//! cookie jar, the trust headers, and for POST/PUT the content type and body.
//! Nothing else is copied from the inbound request.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{
    header::{CONTENT_TYPE, COOKIE},
    HeaderMap, HeaderName, HeaderValue, Method,
};
use url::{form_urlencoded, Url};

use crate::routing::RequestMethod;

pub const X_DISRAPTOR_PROXY: HeaderName = HeaderName::from_static("x-disraptor-proxy");
pub const X_DISRAPTOR_LOCATION: HeaderName = HeaderName::from_static("x-disraptor-location");
pub const X_DISRAPTOR_APP_SECRET_KEY: HeaderName =
    HeaderName::from_static("x-disraptor-app-secret-key");
pub const X_DISRAPTOR_USER: HeaderName = HeaderName::from_static("x-disraptor-user");
pub const X_DISRAPTOR_GROUPS: HeaderName = HeaderName::from_static("x-disraptor-groups");

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Cookie jar of the inbound request, names and values decoded.
pub fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = decode_component(name.trim());
            if name.is_empty() {
                return None;
            }
            Some((name, decode_component(value.trim())))
        })
        .collect()
}

/// Re-serialize a cookie jar: each name and value form-escaped, pairs joined by `;`.
pub fn cookie_header(cookies: &[(String, String)]) -> Option<HeaderValue> {
    if cookies.is_empty() {
        return None;
    }

    let joined = cookies
        .iter()
        .map(|(name, value)| format!("{}={}", escape(name), escape(value)))
        .collect::<Vec<_>>()
        .join(";");

    // Escaped output is plain ASCII.
    HeaderValue::from_str(&joined).ok()
}

fn escape(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// A POST/PUT body as it will be sent upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundBody {
    /// Decoded form fields, re-encoded on send.
    Form(Vec<(String, String)>),
    /// Any other content type, forwarded byte-for-byte.
    Raw(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub content_type: Option<HeaderValue>,
    pub body: OutboundBody,
}

impl Payload {
    fn from_inbound(content_type: Option<&HeaderValue>, body: Bytes) -> Self {
        let is_form = content_type
            .and_then(|ct| ct.to_str().ok())
            .and_then(|ct| ct.split(';').next())
            .map(|essence| essence.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
            .unwrap_or(false);

        let body = if is_form {
            OutboundBody::Form(form_urlencoded::parse(&body).into_owned().collect())
        } else {
            OutboundBody::Raw(body)
        };

        Self {
            content_type: content_type.cloned(),
            body,
        }
    }

    pub fn encode(&self) -> Bytes {
        match &self.body {
            OutboundBody::Form(fields) => {
                let encoded = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields)
                    .finish();
                Bytes::from(encoded)
            }
            OutboundBody::Raw(bytes) => bytes.clone(),
        }
    }
}

/// The outbound verb, carrying only what that verb sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMethod {
    Get,
    Head,
    Post(Payload),
    Put(Payload),
    Delete,
    Options,
    Trace,
}

impl OutboundMethod {
    /// `None` for verbs outside the allowed set.
    pub fn from_inbound(method: &Method, content_type: Option<&HeaderValue>, body: Bytes) -> Option<Self> {
        let outbound = match RequestMethod::from_http(method)? {
            RequestMethod::Get => OutboundMethod::Get,
            RequestMethod::Head => OutboundMethod::Head,
            RequestMethod::Post => OutboundMethod::Post(Payload::from_inbound(content_type, body)),
            RequestMethod::Put => OutboundMethod::Put(Payload::from_inbound(content_type, body)),
            RequestMethod::Delete => OutboundMethod::Delete,
            RequestMethod::Options => OutboundMethod::Options,
            RequestMethod::Trace => OutboundMethod::Trace,
        };
        Some(outbound)
    }

    pub fn request_method(&self) -> RequestMethod {
        match self {
            OutboundMethod::Get => RequestMethod::Get,
            OutboundMethod::Head => RequestMethod::Head,
            OutboundMethod::Post(_) => RequestMethod::Post,
            OutboundMethod::Put(_) => RequestMethod::Put,
            OutboundMethod::Delete => RequestMethod::Delete,
            OutboundMethod::Options => RequestMethod::Options,
            OutboundMethod::Trace => RequestMethod::Trace,
        }
    }

    pub fn http_method(&self) -> Method {
        match self {
            OutboundMethod::Get => Method::GET,
            OutboundMethod::Head => Method::HEAD,
            OutboundMethod::Post(_) => Method::POST,
            OutboundMethod::Put(_) => Method::PUT,
            OutboundMethod::Delete => Method::DELETE,
            OutboundMethod::Options => Method::OPTIONS,
            OutboundMethod::Trace => Method::TRACE,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            OutboundMethod::Post(payload) | OutboundMethod::Put(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Caller identity as asserted to the upstream, group names already trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedCaller {
    pub username: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: OutboundMethod,
    pub url: Url,
    pub headers: HeaderMap,
    pub timeout: Duration,
}

/// Headers for the upstream request. Built from scratch; inbound headers other
/// than the cookie jar are never consulted.
pub fn outbound_headers(inbound: &HeaderMap, secret: &str, caller: Option<&TrustedCaller>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(cookies) = cookie_header(&parse_cookies(inbound)) {
        headers.insert(COOKIE, cookies);
    }

    headers.insert(X_DISRAPTOR_PROXY, HeaderValue::from_static("yes"));
    insert_trust_header(&mut headers, X_DISRAPTOR_APP_SECRET_KEY, secret);

    if let Some(caller) = caller {
        insert_trust_header(&mut headers, X_DISRAPTOR_USER, &caller.username);
        if !caller.groups.is_empty() {
            insert_trust_header(&mut headers, X_DISRAPTOR_GROUPS, &caller.groups.join(","));
        }
    }

    headers
}

fn insert_trust_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_bytes(value.as_bytes()) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "Trust header value is not a valid header, omitted"),
    }
}

/// Content type header for the body, if any.
pub fn content_type_of(method: &OutboundMethod) -> Option<(HeaderName, HeaderValue)> {
    method
        .payload()
        .and_then(|payload| payload.content_type.clone())
        .map(|value| (CONTENT_TYPE, value))
}
