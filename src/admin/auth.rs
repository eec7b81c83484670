use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::admin::error::AdminError;
use crate::http::server::AppState;

/// Bearer check against `admin.api_key`, then the subsystem gate.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let config = state.config.load();

    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let authorized = match auth_header {
        Some(auth_val) => auth_val == format!("Bearer {}", config.admin.api_key),
        None => false,
    };
    if !authorized {
        tracing::warn!(path = %request.uri().path(), "Unauthorized admin request");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    if !config.disraptor.enabled {
        return AdminError::Disabled.into_response();
    }

    next.run(request).await
}
