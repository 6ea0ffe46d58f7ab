//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Client side:
//!     tls.rs (optional rustls listener material)
//!     → axum / axum-server accept loop
//!
//! Backend side:
//!     (scheme, timeout)
//!     → transport.rs TransportCache (shared read, exclusive insert)
//!     → Transport (pooled hyper client, header timeout)
//!     → connector.rs (dial + TLS under one deadline)
//!     → backend
//! ```
//!
//! # Design Decisions
//! - One transport per (scheme, timeout), shared by all backends using it
//! - Transports are built lazily and live for the process lifetime
//! - Backend certificates are not verified

pub mod connector;
pub mod tls;
pub mod transport;

pub use transport::{Transport, TransportCache, TransportCacheKey};
