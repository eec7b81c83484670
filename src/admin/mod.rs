//! Route administration subsystem.
//!
//! # Data Flow
//! ```text
//! PUT/DELETE {prefix}/routes/{id}
//!     → auth.rs (bearer key, enabled gate)
//!     → handlers.rs (JSON in/out)
//!     → route_admin.rs (normalize → validate → persist → announce)
//!     → normalize.rs (path/url/method normalizers, validators)
//! ```
//!
//! # Design Decisions
//! - The API lives under the reserved prefix, so no proxied route can shadow it
//! - Collisions with existing host routes are logged, never blocking
//! - Every successful write bumps the table version

pub mod auth;
pub mod error;
pub mod handlers;
pub mod normalize;
pub mod route_admin;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub use error::AdminError;
pub use route_admin::RouteAdmin;

/// Host patterns served by the admin router, in source-path syntax.
pub fn admin_patterns(prefix: &str) -> Vec<String> {
    vec![
        format!("{prefix}/routes"),
        format!("{prefix}/routes/:id"),
        format!("{prefix}/status"),
    ]
}

pub fn setup_admin_router(state: AppState, prefix: &str) -> Router<AppState> {
    Router::new()
        .route(&format!("{prefix}/routes"), get(list_routes))
        .route(
            &format!("{prefix}/routes/{{id}}"),
            get(get_route).put(put_route).delete(delete_route),
        )
        .route(&format!("{prefix}/status"), get(get_status))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
