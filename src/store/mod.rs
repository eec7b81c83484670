//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! RouteAdmin / ProxyDispatcher
//!     → route_store.rs (route table snapshot, serialized writes)
//!     → group_store.rs (trusted group names)
//!     → kv.rs (namespaced key-value persistence: memory or JSON file)
//! ```
//!
//! # Design Decisions
//! - One owning RouteStore instance, passed explicitly; no global table
//! - Route table persisted as a single blob so a write is all-or-nothing
//! - Readers use an atomically swapped snapshot and never block writers

pub mod group_store;
pub mod kv;
pub mod route_store;

use thiserror::Error;

pub use group_store::GroupStore;
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use route_store::{RouteMap, RouteStore};

/// Namespace holding all gateway state.
pub const NAMESPACE: &str = "disraptor";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored data is malformed: {0}")]
    Serde(#[from] serde_json::Error),
}
