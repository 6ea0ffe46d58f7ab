//! Request duplication and target rewriting.
//!
//! # Responsibilities
//! - Buffer an inbound body once and hand out independent copies
//! - Turn a server-side request (path and query only) into an outbound
//!   request addressed at a backend
//! - Optionally point the `Host` header at that backend
//!
//! # Design Decisions
//! - A duplicate owns its own header map and bytes; later changes to the
//!   original never reach an already queued shadow request
//! - A target that does not parse is an error, never a silent no-op, so a
//!   request cannot leak to the wrong host

use axum::{
    body::Body,
    http::{header::HOST, uri::PathAndQuery, HeaderValue, Request, Uri},
};
use bytes::Bytes;

use crate::config::Backend;
use crate::error::ProxyError;

/// Read the whole body of `request` and return an independent copy.
///
/// The original gets a fresh body over the same bytes, so it can be read
/// once more by the caller. A missing body is treated as empty.
pub async fn duplicate_request(request: &mut Request<Body>) -> Result<Request<Bytes>, ProxyError> {
    let body = std::mem::take(request.body_mut());
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(ProxyError::Body)?;
    *request.body_mut() = Body::from(bytes.clone());

    let mut duplicate = Request::new(bytes);
    *duplicate.method_mut() = request.method().clone();
    *duplicate.uri_mut() = request.uri().clone();
    *duplicate.version_mut() = request.version();
    *duplicate.headers_mut() = request.headers().clone();

    Ok(duplicate)
}

/// Address `request` at `backend`: `scheme://host` followed by the original
/// path and query, untouched.
///
/// On failure the URI is left as it was and the error tells the caller not
/// to forward this leg.
pub fn set_request_target<B>(request: &mut Request<B>, backend: &Backend) -> Result<(), ProxyError> {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(PathAndQuery::as_str)
        .unwrap_or("/");
    let target = format!("{}://{}{}", backend.scheme, backend.host, path_and_query);

    match target.parse::<Uri>() {
        Ok(uri) => {
            *request.uri_mut() = uri;
            Ok(())
        }
        Err(e) => {
            tracing::warn!(target = %target, error = %e, "Cannot rewrite request target");
            Err(ProxyError::InvalidTarget {
                url: target,
                reason: e.to_string(),
            })
        }
    }
}

/// Replace the `Host` header with the backend's host and port.
pub fn rewrite_host<B>(request: &mut Request<B>, backend: &Backend) -> Result<(), ProxyError> {
    let host = HeaderValue::from_str(backend.authority()).map_err(|e| ProxyError::InvalidTarget {
        url: backend.to_string(),
        reason: e.to_string(),
    })?;
    request.headers_mut().insert(HOST, host);
    Ok(())
}
