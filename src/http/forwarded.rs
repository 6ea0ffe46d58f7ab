//! Client address propagation via `X-Forwarded-For` and `Forwarded`.
//!
//! Only `for=` tokens are produced for `Forwarded` (RFC 7239); `by`,
//! `proto` and `host` are not emitted.

use axum::http::{
    header::{HeaderName, FORWARDED},
    HeaderMap, HeaderValue,
};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Insert or extend both forwarding headers with the caller's IP.
pub fn insert_forwarded_headers(headers: &mut HeaderMap, remote_addr: &str) {
    let ip = client_ip(remote_addr);
    insert_or_extend(headers, FORWARDED, &format!("for={ip}"));
    insert_or_extend(headers, X_FORWARDED_FOR, ip);
}

/// The address up to its last `:`, i.e. without the port.
pub fn client_ip(remote_addr: &str) -> &str {
    match remote_addr.rfind(':') {
        Some(port_sep) => &remote_addr[..port_sep],
        None => {
            tracing::warn!(
                remote_addr = %remote_addr,
                "Remote address is not in IP:port form, forwarding it as is"
            );
            remote_addr
        }
    }
}

fn insert_or_extend(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    let combined = match headers
        .get(&name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        Some(existing) => format!("{existing}, {value}"),
        None => value.to_string(),
    };

    match HeaderValue::from_str(&combined) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(e) => tracing::warn!(header = %name, error = %e, "Cannot set forwarding header"),
    }
}
