//! Proxy dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest (method, path, segment values, headers, body)
//!     → dispatcher.rs (secret gate, method, route lookup, target expansion)
//!     → outbound.rs (OutboundMethod, cookie jar, trust headers)
//!     → transport.rs (single upstream attempt, bounded timeout)
//!     → outcome.rs (status mapping, one response per request)
//! ```
//!
//! # Design Decisions
//! - Outbound headers are built from scratch, never copied
//! - No retries; an unreachable upstream is a generic 500
//! - Upstream detail goes to the log only

pub mod dispatcher;
pub mod outbound;
pub mod outcome;
pub mod transport;

pub use dispatcher::{DispatchSettings, InboundRequest, ProxyDispatcher};
pub use outbound::{OutboundBody, OutboundMethod, OutboundRequest, TrustedCaller};
pub use outcome::DispatchOutcome;
pub use transport::{HttpTransport, TransportError, UpstreamResponse, UpstreamTransport};
