//! One outcome per proxied request, rendered exactly once.

use axum::http::{
    header::{CONTENT_TYPE, LOCATION, SET_COOKIE},
    HeaderValue, StatusCode,
};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::proxy::outbound::{X_DISRAPTOR_LOCATION, X_DISRAPTOR_PROXY};
use crate::proxy::transport::UpstreamResponse;

#[derive(Debug)]
pub enum DispatchOutcome {
    /// Subsystem switched off.
    Disabled,
    /// The host has no live registration for the request.
    NoRoute,
    BodyTooLarge,
    /// App secret key unset; nothing was sent.
    Forbidden,
    /// The host matched, but the stored table has no such route.
    RouteMissing,
    MethodRejected,
    UpstreamUnreachable,
    /// 2xx, relayed verbatim.
    Relayed(UpstreamResponse),
    /// 303, relayed with the location moved to `x-disraptor-location`.
    SeeOther(UpstreamResponse),
    UpstreamNotFound,
    /// Any other upstream status.
    Unhandled(StatusCode),
}

impl DispatchOutcome {
    pub fn from_upstream(response: UpstreamResponse) -> Self {
        match response.status {
            status if status.is_success() => DispatchOutcome::Relayed(response),
            StatusCode::SEE_OTHER => DispatchOutcome::SeeOther(response),
            StatusCode::NOT_FOUND => DispatchOutcome::UpstreamNotFound,
            status => DispatchOutcome::Unhandled(status),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DispatchOutcome::Disabled => StatusCode::SERVICE_UNAVAILABLE,
            DispatchOutcome::NoRoute => StatusCode::NOT_FOUND,
            DispatchOutcome::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchOutcome::Forbidden => StatusCode::FORBIDDEN,
            DispatchOutcome::RouteMissing => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchOutcome::MethodRejected => StatusCode::METHOD_NOT_ALLOWED,
            DispatchOutcome::UpstreamUnreachable => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchOutcome::Relayed(response) => response.status,
            DispatchOutcome::SeeOther(_) => StatusCode::SEE_OTHER,
            DispatchOutcome::UpstreamNotFound => StatusCode::NOT_FOUND,
            DispatchOutcome::Unhandled(status) => *status,
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Disabled => "disabled",
            DispatchOutcome::NoRoute => "no_route",
            DispatchOutcome::BodyTooLarge => "body_too_large",
            DispatchOutcome::Forbidden => "forbidden",
            DispatchOutcome::RouteMissing => "route_missing",
            DispatchOutcome::MethodRejected => "method_rejected",
            DispatchOutcome::UpstreamUnreachable => "upstream_unreachable",
            DispatchOutcome::Relayed(_) => "relayed",
            DispatchOutcome::SeeOther(_) => "see_other",
            DispatchOutcome::UpstreamNotFound => "upstream_not_found",
            DispatchOutcome::Unhandled(_) => "unhandled",
        }
    }

    /// Whether an upstream answered.
    fn reached_upstream(&self) -> bool {
        matches!(
            self,
            DispatchOutcome::Relayed(_)
                | DispatchOutcome::SeeOther(_)
                | DispatchOutcome::UpstreamNotFound
                | DispatchOutcome::Unhandled(_)
        )
    }
}

impl IntoResponse for DispatchOutcome {
    fn into_response(self) -> Response {
        let marked = self.reached_upstream();
        let status = self.status();

        let mut response = match self {
            DispatchOutcome::Relayed(upstream) => relay(status, upstream),
            DispatchOutcome::SeeOther(upstream) => {
                let set_cookies: Vec<HeaderValue> =
                    upstream.headers.get_all(SET_COOKIE).iter().cloned().collect();
                let location = upstream.headers.get(LOCATION).cloned();

                let mut response = relay(status, upstream);
                let headers = response.headers_mut();
                for cookie in set_cookies {
                    headers.append(SET_COOKIE, cookie);
                }
                if let Some(location) = location {
                    headers.insert(X_DISRAPTOR_LOCATION, location);
                }
                response
            }
            _ => failed_response(status),
        };

        if marked {
            response
                .headers_mut()
                .insert(X_DISRAPTOR_PROXY, HeaderValue::from_static("yes"));
        }
        response
    }
}

/// Status, body and content type only; no other upstream header is copied.
fn relay(status: StatusCode, upstream: UpstreamResponse) -> Response {
    let mut response = (status, upstream.body).into_response();
    let headers = response.headers_mut();
    headers.remove(CONTENT_TYPE);
    if let Some(content_type) = upstream.headers.get(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, content_type.clone());
    }
    response
}

/// The uniform failure payload.
pub fn failed_response(status: StatusCode) -> Response {
    (status, Json(serde_json::json!({ "failed": "FAILED" }))).into_response()
}
