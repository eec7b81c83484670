//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → live.rs (host dispatch table: matchit router per method)
//!     → Return: route id + extracted segment values, or no route
//!
//! Proxy step:
//!     (matched route id, path, segment values)
//!     → table.rs (fetch by id, re-check method and pattern)
//!     → Return: full Route record
//!
//! Table change:
//!     RouteAdmin bumps version
//!     → live.rs refresher rebuilds and swaps the routers
//! ```
//!
//! # Design Decisions
//! - Patterns are parsed into segments once; no substring surgery on paths
//! - Live routers are rebuilt whole and swapped atomically
//! - Refresh is asynchronous to the admin write that caused it

pub mod live;
pub mod pattern;
pub mod route;
pub mod table;

pub use live::{ClaimedPattern, HostRoutes, LiveMatch, LiveRoutes};
pub use pattern::{expand_target, PathPattern, PatternError, Segment, SegmentValues, TargetError};
pub use route::{RequestMethod, Route, UnknownMethod};
pub use table::RouteTable;
