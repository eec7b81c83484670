//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated)
//!     → shared via Arc<ArcSwap<ProxyConfig>> to handlers
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<ProxyConfig>
//!     → next request observes new gate, secret and timeouts
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A reload that fails validation keeps the running config

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, DisraptorConfig, IdentityConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    ProxyConfig, SessionConfig, StorageConfig,
};
