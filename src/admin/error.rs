//! Errors surfaced by route administration.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::routing::PatternError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("source path '{0}' must not end with '/'")]
    TrailingSlash(String),

    #[error("source path '{path}' is under the reserved prefix '{prefix}'")]
    ReservedPrefix { path: String, prefix: String },

    #[error("request method '{0}' is not allowed")]
    InvalidMethod(String),

    #[error("target url '{0}' is not a valid absolute http(s) url")]
    InvalidUrl(String),

    #[error("invalid source path: {0}")]
    InvalidPattern(#[from] PatternError),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("route '{0}' not found")]
    NotFound(String),

    #[error("disraptor is disabled")]
    Disabled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AdminError {
    pub fn status(&self) -> StatusCode {
        match self {
            AdminError::TrailingSlash(_)
            | AdminError::ReservedPrefix { .. }
            | AdminError::InvalidMethod(_)
            | AdminError::InvalidUrl(_)
            | AdminError::InvalidPattern(_)
            | AdminError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
            AdminError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AdminError {
    fn from(rejection: JsonRejection) -> Self {
        AdminError::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AdminError::Store(e) => {
                tracing::error!(error = %e, "Route store failure");
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_requests() {
        assert_eq!(AdminError::TrailingSlash("/a/".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AdminError::InvalidMethod("patch".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AdminError::ReservedPrefix {
                path: "/admin/x".into(),
                prefix: "/admin".into()
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AdminError::InvalidBody("missing field".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AdminError::NotFound("1".into()).status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn store_error_body_is_generic() {
        let err = AdminError::Store(StoreError::Io(std::io::Error::other("/var/secret/path")));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "internal storage error");
    }
}
