//! Command-line interface.
//!
//! Flag names follow the classic `teeproxy` conventions (`-a` for the
//! primary, repeatable `-b` for shadows, dotted per-leg options). Every flag
//! is optional so that values from `--config` survive unless overridden.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{load_config, validate_config, ConfigError, ProxyConfig, TlsConfig};

#[derive(Parser, Debug, Default)]
#[command(name = "tee-proxy", version)]
#[command(about = "Forward traffic to a primary backend and mirror it to shadow backends", long_about = None)]
pub struct Cli {
    /// Address to accept requests on (e.g. `:8888`).
    #[arg(short = 'l', long = "listen")]
    pub listen: Option<String>,

    /// Primary endpoint, e.g. http://localhost:8080/production
    #[arg(short = 'a', long = "primary")]
    pub primary: Option<String>,

    /// Shadow endpoint receiving mirrored traffic; repeat for several.
    #[arg(short = 'b', long = "alternate")]
    pub alternates: Vec<String>,

    /// Timeout in millis for primary traffic.
    #[arg(long = "a.timeout", value_name = "MS")]
    pub primary_timeout: Option<u64>,

    /// Timeout in millis for shadow traffic.
    #[arg(long = "b.timeout", value_name = "MS")]
    pub alternate_timeout: Option<u64>,

    /// Shadow delivery workers, 0 for one per CPU.
    #[arg(long = "b.workers")]
    pub workers: Option<usize>,

    /// Capacity of the shadow delivery queue.
    #[arg(long = "b.chanSize")]
    pub queue_capacity: Option<usize>,

    /// Rewrite the Host header for primary traffic.
    #[arg(long = "a.rewrite")]
    pub primary_host_rewrite: bool,

    /// Rewrite the Host header for shadow traffic.
    #[arg(long = "b.rewrite")]
    pub alternate_host_rewrite: bool,

    /// Percentage of traffic mirrored to shadows.
    #[arg(long = "b.percent", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub percent: Option<u8>,

    /// Read shadow response bodies to the end so connections are reused.
    #[arg(long = "b.drain")]
    pub drain: bool,

    /// TLS certificate file path.
    #[arg(long = "cert.file")]
    pub cert_file: Option<String>,

    /// TLS private key file path.
    #[arg(long = "key.file")]
    pub key_file: Option<String>,

    /// Send the client IP to backends via X-Forwarded-For and Forwarded.
    #[arg(long = "forward-client-ip")]
    pub forward_client_ip: bool,

    /// Close connections to clients and backends after each request.
    #[arg(long = "close-connections")]
    pub close_connections: bool,

    /// TOML configuration file; flags take precedence over its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Prometheus exporter address (e.g. 127.0.0.1:9090).
    #[arg(long)]
    pub metrics: Option<String>,

    /// Default log level when RUST_LOG is unset.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Load the optional file, apply flags and validate the result.
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Overlay flags that were given onto `config`.
    pub fn apply(self, config: &mut ProxyConfig) {
        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        if let Some(primary) = self.primary {
            config.primary.target = primary;
        }
        if !self.alternates.is_empty() {
            config.shadow.targets = self.alternates;
        }
        if let Some(ms) = self.primary_timeout {
            config.primary.timeout_ms = ms;
        }
        if let Some(ms) = self.alternate_timeout {
            config.shadow.timeout_ms = ms;
        }
        if let Some(workers) = self.workers {
            config.shadow.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.shadow.queue_capacity = capacity;
        }
        if let Some(percent) = self.percent {
            config.shadow.percent = percent;
        }
        config.primary.host_rewrite |= self.primary_host_rewrite;
        config.shadow.host_rewrite |= self.alternate_host_rewrite;
        config.shadow.drain_responses |= self.drain;
        config.forward_client_ip |= self.forward_client_ip;
        config.close_connections |= self.close_connections;

        // TLS is only enabled when both halves are known.
        match (self.cert_file, self.key_file) {
            (Some(cert_path), Some(key_path)) => {
                config.listener.tls = Some(TlsConfig { cert_path, key_path });
            }
            (Some(cert_path), None) => {
                if let Some(tls) = config.listener.tls.as_mut() {
                    tls.cert_path = cert_path;
                }
            }
            (None, Some(key_path)) => {
                if let Some(tls) = config.listener.tls.as_mut() {
                    tls.key_path = key_path;
                }
            }
            (None, None) => {}
        }

        if let Some(addr) = self.metrics {
            config.observability.metrics_address = Some(addr);
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_teeproxy_style_flags() {
        let cli = Cli::try_parse_from([
            "tee-proxy",
            "-l",
            ":9000",
            "-a",
            "http://localhost:8080",
            "-b",
            "http://localhost:8081",
            "-b",
            "https://staging:8443",
            "--a.timeout",
            "500",
            "--b.percent",
            "30",
            "--b.chanSize",
            "16",
            "--b.rewrite",
            "--forward-client-ip",
        ])
        .unwrap();

        let config = cli.into_config().unwrap();
        assert_eq!(config.listener.bind_address, ":9000");
        assert_eq!(config.primary.timeout_ms, 500);
        assert_eq!(config.shadow.timeout_ms, 1000);
        assert_eq!(
            config.shadow.targets,
            vec!["http://localhost:8081", "https://staging:8443"]
        );
        assert_eq!(config.shadow.percent, 30);
        assert_eq!(config.shadow.queue_capacity, 16);
        assert!(config.shadow.host_rewrite);
        assert!(!config.primary.host_rewrite);
        assert!(config.forward_client_ip);
        assert!(config.listener.tls.is_none());
    }

    #[test]
    fn rejects_percent_above_hundred() {
        let result = Cli::try_parse_from(["tee-proxy", "-a", "http://x", "--b.percent", "150"]);
        assert!(result.is_err());
    }

    #[test]
    fn missing_primary_fails_validation() {
        let cli = Cli::try_parse_from(["tee-proxy", "-b", "http://localhost:8081"]).unwrap();
        assert!(matches!(cli.into_config(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn tls_enabled_with_cert_and_key() {
        let cli = Cli::try_parse_from([
            "tee-proxy",
            "-a",
            "http://x:1",
            "--cert.file",
            "cert.pem",
            "--key.file",
            "key.pem",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();
        let tls = config.listener.tls.unwrap();
        assert_eq!(tls.cert_path, "cert.pem");
        assert_eq!(tls.key_path, "key.pem");
    }
}
