//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Parse flags → Load config → Validate → Start workers → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → broadcast → listener stops accepting → in-flight requests finish
//!
//! Supervision (supervise.rs):
//!     each request / each shadow job → catch panic → log → continue
//! ```

pub mod shutdown;
pub mod supervise;

pub use shutdown::Shutdown;
pub use supervise::{isolate, Panicked};
