//! Disraptor: a configurable reverse-proxy gateway.
//!
//! Operators maintain a table of routes (source path pattern and method to
//! target URL) through an admin API; matching inbound requests are forwarded
//! to their target with trust headers identifying the caller.

// Core subsystems
pub mod config;
pub mod http;
pub mod proxy;
pub mod routing;
pub mod store;

// Route administration and caller identity
pub mod admin;
pub mod identity;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
