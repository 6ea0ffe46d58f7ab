//! Pooled backend transports, cached per (scheme, timeout).
//!
//! A transport is a dialer and connection-pool configuration, not a binding
//! to one host, so every request sharing a scheme and timeout shares the
//! same pool regardless of which backend it targets.
//!
//! # Timeouts
//! ```text
//! dial + TLS handshake      ── bounded by the connector
//! request body upload       ── unbounded, paced by the client
//! wait for response headers ── bounded, starts once the body is sent
//! response body             ── streamed without a deadline
//! ```

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, Version};
use bytes::Bytes;
use hyper::body::{Body as HttpBody, Frame, Incoming, SizeHint};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::sync::oneshot;

use crate::config::Scheme;
use crate::error::ProxyError;
use crate::net::connector::TimedConnector;
use crate::observability::metrics;

/// Cache key. Two requests with equal keys share one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportCacheKey {
    pub scheme: Scheme,
    pub timeout: Duration,
}

/// A connection-pooling HTTP/1.1 client configured for one cache key.
pub struct Transport {
    client: Client<TimedConnector, UploadBody>,
    key: TransportCacheKey,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Build a transport. Dial and TLS handshake share the timeout, TCP
    /// keep-alive probes run at ten times it, certificates are not verified
    /// and redirects are handed back to the caller untouched.
    pub fn new(key: TransportCacheKey, close_connections: bool) -> Result<Self, ProxyError> {
        let connector = TimedConnector::new(key.timeout, key.timeout * 10).map_err(|source| {
            ProxyError::TransportBuild {
                scheme: key.scheme.as_str(),
                source,
            }
        })?;

        let mut builder = Client::builder(TokioExecutor::new());
        if close_connections {
            builder.pool_max_idle_per_host(0);
        }

        Ok(Self {
            client: builder.build(connector),
            key,
        })
    }

    pub fn key(&self) -> TransportCacheKey {
        self.key
    }

    /// Send `request` and wait for the response headers.
    ///
    /// The request URI must be absolute. Headers go out exactly as given;
    /// `Host` is only filled in from the URI when absent. The header
    /// timeout starts once the whole body has been written.
    pub async fn round_trip(
        &self,
        request: Request<Body>,
    ) -> Result<Response<Incoming>, ProxyError> {
        let (mut parts, body) = request.into_parts();
        if parts.uri.scheme().is_none() || parts.uri.authority().is_none() {
            return Err(ProxyError::InvalidTarget {
                url: parts.uri.to_string(),
                reason: "relative URI".into(),
            });
        }
        parts.version = Version::HTTP_11;

        let (sent_tx, sent_rx) = oneshot::channel();
        let body = UploadBody {
            inner: body,
            _sent: sent_tx,
        };

        let pending = self.client.request(Request::from_parts(parts, body));
        tokio::pin!(pending);

        // The client drops the body after writing its last frame, or when
        // the exchange fails first.
        tokio::select! {
            biased;
            result = &mut pending => return Ok(result?),
            _ = sent_rx => {}
        }

        match tokio::time::timeout(self.key.timeout, pending).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProxyError::Timeout(self.key.timeout)),
        }
    }
}

/// Request body that signals, by being dropped, that the upload is over.
struct UploadBody {
    inner: Body,
    _sent: oneshot::Sender<()>,
}

impl HttpBody for UploadBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Registry of transports, lazily filled and never evicted.
///
/// The key space is fixed by configuration (usually the primary's and the
/// shadows' timeouts), so the map stays tiny.
#[derive(Debug, Default)]
pub struct TransportCache {
    transports: RwLock<HashMap<TransportCacheKey, Arc<Transport>>>,
    close_connections: bool,
    constructed: AtomicUsize,
}

impl TransportCache {
    pub fn new(close_connections: bool) -> Self {
        Self {
            transports: RwLock::new(HashMap::new()),
            close_connections,
            constructed: AtomicUsize::new(0),
        }
    }

    /// Return the transport for `(scheme, timeout)`, building it on first use.
    pub fn get(&self, scheme: Scheme, timeout: Duration) -> Result<Arc<Transport>, ProxyError> {
        let key = TransportCacheKey { scheme, timeout };

        if let Some(transport) = self
            .transports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(transport));
        }

        let mut transports = self
            .transports
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller may have won the race between the two locks.
        if let Some(transport) = transports.get(&key) {
            return Ok(Arc::clone(transport));
        }

        let transport = Arc::new(Transport::new(key, self.close_connections)?);
        transports.insert(key, Arc::clone(&transport));
        self.constructed.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            scheme = %scheme,
            timeout = ?timeout,
            close_connections = self.close_connections,
            "Transport created"
        );
        metrics::record_transport_created(scheme.as_str());

        Ok(transport)
    }

    /// Number of transports constructed so far.
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.transports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
