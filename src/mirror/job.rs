//! Shadow jobs and their delivery.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{to_bytes, Body};
use axum::http::Request;
use bytes::Bytes;

use crate::config::Scheme;
use crate::error::ProxyError;
use crate::mirror::pool::JobHandler;
use crate::net::TransportCache;

/// A mirrored request waiting for delivery. Owned by the queue until a
/// worker takes it; nothing else keeps a reference.
#[derive(Debug)]
pub struct ShadowJob {
    /// Fully buffered, already addressed at the shadow backend.
    pub request: Request<Bytes>,
    pub timeout: Duration,
    pub scheme: Scheme,
}

/// Sends shadow jobs and throws the responses away.
#[derive(Debug)]
pub struct ShadowDeliverer {
    transports: Arc<TransportCache>,
    drain_responses: bool,
}

impl ShadowDeliverer {
    pub fn new(transports: Arc<TransportCache>, drain_responses: bool) -> Self {
        Self {
            transports,
            drain_responses,
        }
    }
}

impl JobHandler for ShadowDeliverer {
    type Job = ShadowJob;

    async fn handle(&self, job: ShadowJob) -> Result<(), ProxyError> {
        let start = Instant::now();
        let transport = self.transports.get(job.scheme, job.timeout)?;
        let method = job.request.method().clone();
        let uri = job.request.uri().clone();

        let response = transport.round_trip(job.request.map(Body::from)).await?;
        let status = response.status();

        if self.drain_responses {
            // Reading to the end hands the connection back to the pool.
            let body = Body::new(response.into_body());
            match tokio::time::timeout(job.timeout, to_bytes(body, usize::MAX)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::debug!(uri = %uri, error = %e, "Shadow body read failed"),
                Err(_) => tracing::debug!(uri = %uri, "Shadow body drain timed out"),
            }
        } else {
            drop(response);
        }

        tracing::debug!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?start.elapsed(),
            "Shadow request delivered"
        );
        Ok(())
    }
}
