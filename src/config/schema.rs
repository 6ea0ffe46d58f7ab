//! Configuration schema definitions.
//!
//! All sections carry `#[serde(default)]` so a TOML file only needs the
//! fields it wants to change. Timeouts are expressed in milliseconds.

use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::backend::Backend;

/// Root configuration for the mirroring proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Client-facing listener (bind address, TLS).
    pub listener: ListenerConfig,

    /// Production backend whose responses reach the client.
    pub primary: PrimaryConfig,

    /// Mirrored backends whose responses are discarded.
    pub shadow: ShadowConfig,

    /// Inject `X-Forwarded-For` and `Forwarded` with the caller's IP.
    pub forward_client_ip: bool,

    /// Disable keep-alive towards clients and backends.
    pub close_connections: bool,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    pub fn primary_backend(&self) -> Backend {
        Backend::parse(&self.primary.target)
    }

    /// Shadow backends in configuration order.
    pub fn shadow_backends(&self) -> Vec<Backend> {
        self.shadow.targets.iter().map(|t| Backend::parse(t)).collect()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address. A leading `:` (e.g. `:8888`) binds all interfaces.
    pub bind_address: String,

    /// Serve TLS when present.
    pub tls: Option<TlsConfig>,
}

impl ListenerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        if self.bind_address.starts_with(':') {
            format!("0.0.0.0{}", self.bind_address).parse()
        } else {
            self.bind_address.parse()
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: ":8888".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Primary backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PrimaryConfig {
    /// Target URL, `scheme://host[:port][/prefix]`.
    pub target: String,

    /// Dial, TLS handshake and response-header timeout in milliseconds.
    pub timeout_ms: u64,

    /// Overwrite the `Host` header with the primary's host.
    pub host_rewrite: bool,
}

impl PrimaryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            timeout_ms: 2500,
            host_rewrite: false,
        }
    }
}

/// Shadow traffic configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Target URLs receiving mirrored requests.
    pub targets: Vec<String>,

    /// Per-delivery timeout in milliseconds.
    pub timeout_ms: u64,

    /// Overwrite the `Host` header with each shadow's host.
    pub host_rewrite: bool,

    /// Percentage (0-100) of requests mirrored.
    pub percent: u8,

    /// Delivery workers; 0 means one per available CPU.
    pub workers: usize,

    /// Bounded queue capacity between handlers and workers.
    pub queue_capacity: usize,

    /// Read shadow response bodies to completion before dropping them,
    /// which lets the connection return to the pool.
    pub drain_responses: bool,
}

impl ShadowConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Worker count with the CPU default applied.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            timeout_ms: 1000,
            host_rewrite: false,
            percent: 100,
            workers: 0,
            queue_capacity: 1000,
            drain_responses: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,

    /// Prometheus exporter bind address; disabled when absent.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}
