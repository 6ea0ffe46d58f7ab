//! Error types for the request forwarding and shadow delivery paths.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors raised while preparing or delivering a proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The rewritten destination could not be parsed; the leg must not be forwarded.
    #[error("invalid target {url}: {reason}")]
    InvalidTarget { url: String, reason: String },

    /// The inbound body could not be read while buffering it for duplication.
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),

    /// A pooled transport could not be constructed.
    #[error("failed to build {scheme} transport: {source}")]
    TransportBuild {
        scheme: &'static str,
        #[source]
        source: rustls::Error,
    },

    /// Dial, TLS or protocol failure talking to a backend.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// Backend did not send response headers in time.
    #[error("no response headers within {0:?}")]
    Timeout(Duration),

    /// Every shadow worker is gone.
    #[error("shadow queue is closed")]
    QueueClosed,
}

impl ProxyError {
    /// Status reported to the client when the primary leg fails with this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Body(_) => StatusCode::BAD_REQUEST,
            ProxyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::InvalidTarget { .. }
            | ProxyError::TransportBuild { .. }
            | ProxyError::Upstream(_)
            | ProxyError::QueueClosed => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let reason = status.canonical_reason().unwrap_or("Upstream request failed");
        (status, reason).into_response()
    }
}
