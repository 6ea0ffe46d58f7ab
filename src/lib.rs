//! HTTP traffic-mirroring proxy library.
//!
//! Every inbound request is forwarded to a primary backend whose response is
//! returned to the client unchanged, while a sampled share of requests is
//! copied to shadow backends through a bounded worker pool.

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod mirror;
pub mod net;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::MirrorServer;
pub use lifecycle::Shutdown;
