//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, listener)
//!     → handler.rs (per-request orchestration)
//!         → forwarded.rs (client IP headers)
//!         → request.rs (duplicate, retarget, host rewrite)
//!     → primary response streamed back to the client
//! ```

pub mod forwarded;
pub mod handler;
pub mod request;
pub mod server;

pub use handler::{proxy_handler, supervised, AppState, MirrorSettings};
pub use server::MirrorServer;
