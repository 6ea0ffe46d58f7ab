//! Configuration validation.
//!
//! Serde handles syntax; this pass checks values. Every problem is reported,
//! not just the first one.

use thiserror::Error;

use crate::config::backend::Backend;
use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("primary target is required")]
    MissingPrimary,

    #[error("target {0:?} has no host")]
    EmptyHost(String),

    #[error("shadow percent must be within 0..=100, got {0}")]
    PercentOutOfRange(u8),

    #[error("{0} timeout must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("shadow queue capacity must be greater than zero")]
    ZeroQueueCapacity,

    #[error("invalid listen address {0:?}")]
    InvalidListenAddress(String),

    #[error("TLS requires both a certificate and a private key")]
    IncompleteTls,

    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.primary.target.trim().is_empty() {
        errors.push(ValidationError::MissingPrimary);
    } else {
        check_host(&config.primary.target, &mut errors);
    }
    for target in &config.shadow.targets {
        check_host(target, &mut errors);
    }

    if config.shadow.percent > 100 {
        errors.push(ValidationError::PercentOutOfRange(config.shadow.percent));
    }
    if config.primary.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("primary"));
    }
    if config.shadow.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("shadow"));
    }
    if config.shadow.queue_capacity == 0 {
        errors.push(ValidationError::ZeroQueueCapacity);
    }

    if config.listener.socket_addr().is_err() {
        errors.push(ValidationError::InvalidListenAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::IncompleteTls);
        }
    }
    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_host(target: &str, errors: &mut Vec<ValidationError>) {
    if Backend::parse(target).authority().is_empty() {
        errors.push(ValidationError::EmptyHost(target.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    fn valid() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.primary.target = "http://127.0.0.1:8080".into();
        config
    }

    #[test]
    fn accepts_minimal_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = valid();
        config.primary.target = String::new();
        config.shadow.targets.push("https://".into());
        config.shadow.percent = 101;
        config.shadow.queue_capacity = 0;
        config.listener.tls = Some(TlsConfig {
            cert_path: "cert.pem".into(),
            key_path: String::new(),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingPrimary,
                ValidationError::EmptyHost("https://".into()),
                ValidationError::PercentOutOfRange(101),
                ValidationError::ZeroQueueCapacity,
                ValidationError::IncompleteTls,
            ]
        );
    }

    #[test]
    fn rejects_bad_listen_address() {
        let mut config = valid();
        config.listener.bind_address = "not-an-address".into();
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::InvalidListenAddress("not-an-address".into())]
        );
    }
}
