//! Shadow traffic subsystem.
//!
//! # Data Flow
//! ```text
//! handler
//!     → sampler.rs (mirror this request?)
//!     → ShadowJob per shadow backend (buffered copy, rewritten target)
//!     → pool.rs bounded queue (enqueue waits when full)
//!     → W workers → job.rs ShadowDeliverer
//!     → TransportCache → shadow backend, response discarded
//! ```
//!
//! # Design Decisions
//! - Best effort: failed deliveries are logged and dropped, never retried
//! - Backpressure over loss: a full queue slows intake instead of dropping
//! - Primary forwarding starts only after the request's jobs are queued

pub mod job;
pub mod pool;
pub mod sampler;

pub use job::{ShadowDeliverer, ShadowJob};
pub use pool::{JobHandler, WorkerPool};
pub use sampler::TrafficSampler;

/// Producer side of the shadow delivery pool.
pub type ShadowQueue = WorkerPool<ShadowJob>;
