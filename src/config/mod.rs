//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional TOML file
//!     → loader.rs (parse & deserialize over defaults)
//!     → cli.rs (command-line flags override file values)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → Backends parsed once and shared with the handler and workers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod backend;
pub mod loader;
pub mod schema;
pub mod validation;

pub use backend::{Backend, Scheme};
pub use loader::{load_config, ConfigError};
pub use schema::{
    ListenerConfig, ObservabilityConfig, PrimaryConfig, ProxyConfig, ShadowConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
