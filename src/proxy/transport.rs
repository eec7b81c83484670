//! Upstream transport.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use reqwest::redirect::Policy;
use thiserror::Error;

use crate::proxy::outbound::{content_type_of, OutboundRequest};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream timed out")]
    Timeout,

    #[error("could not connect to upstream: {0}")]
    Connect(String),

    #[error("upstream request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Sends one outbound request. At most one attempt is made per call.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError>;
}

/// `reqwest`-backed transport. Redirects are never followed.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .no_proxy()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamTransport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.http_method(), request.url)
            .headers(request.headers)
            .timeout(request.timeout);

        if let Some((name, value)) = content_type_of(&request.method) {
            builder = builder.header(name, value);
        }
        if let Some(payload) = request.method.payload() {
            builder = builder.body(payload.encode());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
