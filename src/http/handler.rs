//! Per-request orchestration: mirror, then forward to the primary.
//!
//! # Request Flow
//! ```text
//! inbound request
//!     → forwarded headers (optional)
//!     → sampler: mirror? ── yes ─→ for each shadow: duplicate → retarget → enqueue
//!     → retarget original at primary
//!     → primary round trip (TransportCache)
//!     → status + headers + streamed body back to the client
//! ```
//!
//! Everything after header injection runs under [`isolate`], so a panic
//! costs one request a 500 instead of taking the serving task down.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::config::{Backend, ProxyConfig};
use crate::error::ProxyError;
use crate::http::forwarded::insert_forwarded_headers;
use crate::http::request::{duplicate_request, rewrite_host, set_request_target};
use crate::lifecycle::isolate;
use crate::mirror::{ShadowDeliverer, ShadowJob, ShadowQueue, TrafficSampler};
use crate::net::TransportCache;
use crate::observability::metrics;

/// Immutable routing settings derived from the configuration at startup.
#[derive(Debug, Clone)]
pub struct MirrorSettings {
    pub primary: Backend,
    pub shadows: Vec<Backend>,
    pub primary_timeout: Duration,
    pub shadow_timeout: Duration,
    pub primary_host_rewrite: bool,
    pub shadow_host_rewrite: bool,
    pub forward_client_ip: bool,
}

impl MirrorSettings {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            primary: config.primary_backend(),
            shadows: config.shadow_backends(),
            primary_timeout: config.primary.timeout(),
            shadow_timeout: config.shadow.timeout(),
            primary_host_rewrite: config.primary.host_rewrite,
            shadow_host_rewrite: config.shadow.host_rewrite,
            forward_client_ip: config.forward_client_ip,
        }
    }
}

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<MirrorSettings>,
    pub sampler: Arc<TrafficSampler>,
    pub transports: Arc<TransportCache>,
    /// Absent when no shadow backends are configured.
    pub shadow_queue: Option<ShadowQueue>,
}

impl AppState {
    /// Build the state and, if shadows are configured, start the worker
    /// pool. Must be called from within a Tokio runtime.
    pub fn new(config: &ProxyConfig) -> Self {
        let settings = Arc::new(MirrorSettings::from_config(config));
        let transports = Arc::new(TransportCache::new(config.close_connections));

        let shadow_queue = if settings.shadows.is_empty() {
            None
        } else {
            let deliverer = ShadowDeliverer::new(
                Arc::clone(&transports),
                config.shadow.drain_responses,
            );
            Some(ShadowQueue::start(
                config.shadow.effective_workers(),
                config.shadow.queue_capacity,
                Arc::new(deliverer),
            ))
        };

        Self {
            settings,
            sampler: Arc::new(TrafficSampler::new(config.shadow.percent)),
            transports,
            shadow_queue,
        }
    }
}

/// Main proxy handler.
pub async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    if state.settings.forward_client_ip {
        insert_forwarded_headers(request.headers_mut(), &remote.to_string());
    }

    let response = supervised(&method, &path, serve(&state, request)).await;

    metrics::record_primary_request(method.as_str(), response.status().as_u16(), start);
    response
}

/// Await `serving` under [`isolate`]. An error becomes its status response
/// and a panic becomes a bare 500, both logged against the request.
pub async fn supervised<F>(method: &Method, path: &str, serving: F) -> Response
where
    F: Future<Output = Result<Response, ProxyError>>,
{
    match isolate(serving).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::error!(
                method = %method,
                path = %path,
                error = %e,
                "Primary request failed"
            );
            e.into_response()
        }
        Err(panic) => {
            tracing::error!(
                method = %method,
                path = %path,
                panic = %panic,
                "Recovered from panic while serving primary request"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn serve(state: &AppState, mut request: Request<Body>) -> Result<Response, ProxyError> {
    if let Some(queue) = &state.shadow_queue {
        if state.sampler.should_mirror() {
            mirror(&state.settings, queue, &mut request).await?;
        }
    }

    let primary = &state.settings.primary;
    set_request_target(&mut request, primary)?;
    if state.settings.primary_host_rewrite {
        rewrite_host(&mut request, primary)?;
    }

    let transport = state
        .transports
        .get(primary.scheme, state.settings.primary_timeout)?;
    let upstream = transport.round_trip(request).await?;

    Ok(upstream.map(Body::new))
}

/// Queue one job per shadow backend, in configuration order.
///
/// A backend whose job cannot be built or queued is skipped with a warning.
/// Only a failure to read the inbound body is returned, since the primary
/// cannot be forwarded faithfully either.
async fn mirror(
    settings: &MirrorSettings,
    queue: &ShadowQueue,
    request: &mut Request<Body>,
) -> Result<(), ProxyError> {
    for backend in &settings.shadows {
        let mut shadow = duplicate_request(request).await?;

        let prepared = set_request_target(&mut shadow, backend).and_then(|()| {
            if settings.shadow_host_rewrite {
                rewrite_host(&mut shadow, backend)
            } else {
                Ok(())
            }
        });
        if let Err(e) = prepared {
            tracing::warn!(shadow = %backend, error = %e, "Skipping shadow backend");
            continue;
        }

        let job = ShadowJob {
            request: shadow,
            timeout: settings.shadow_timeout,
            scheme: backend.scheme,
        };
        match queue.enqueue(job).await {
            Ok(()) => metrics::record_shadow_enqueued(),
            Err(e) => tracing::warn!(shadow = %backend, error = %e, "Shadow request dropped"),
        }
    }
    Ok(())
}
