//! Upstream backend addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport scheme spoken to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An upstream target, parsed once from a `scheme://host` string.
///
/// `host` is everything after the scheme separator, so it may carry a port
/// and a path prefix (`localhost:8080/production`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    pub scheme: Scheme,
    pub host: String,
}

impl Backend {
    /// Parse a target string. Values starting with `https` select TLS,
    /// everything else is plain HTTP with an optional `http://` prefix.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with("https") {
            Self {
                scheme: Scheme::Https,
                host: value.strip_prefix("https://").unwrap_or(value).to_string(),
            }
        } else {
            Self {
                scheme: Scheme::Http,
                host: value.strip_prefix("http://").unwrap_or(value).to_string(),
            }
        }
    }

    /// Host and port without any path prefix, as used for the `Host` header.
    pub fn authority(&self) -> &str {
        match self.host.find('/') {
            Some(end) => &self.host[..end],
            None => &self.host,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)
    }
}
