//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (request ID, request span)
//!     → server.rs (admin API under the reserved prefix, proxy fallback)
//!     → [routing::live decides the route]
//!     → [proxy dispatcher performs the round trip]
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer, StartupError};
