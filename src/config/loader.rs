//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML configuration file.
///
/// Validation is left to the caller because command-line flags are layered
/// on top of the file before the result is checked.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ProxyConfig = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_partial_file_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
forward_client_ip = true

[primary]
target = "http://127.0.0.1:8080"

[shadow]
targets = ["http://127.0.0.1:8081", "https://staging.internal"]
percent = 25
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert!(config.forward_client_ip);
        assert_eq!(config.primary.target, "http://127.0.0.1:8080");
        assert_eq!(config.primary.timeout_ms, 2500);
        assert_eq!(config.shadow.targets.len(), 2);
        assert_eq!(config.shadow.percent, 25);
        assert_eq!(config.shadow.queue_capacity, 1000);
    }

    #[test]
    fn reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[shadow]\npercent = \"half\"").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn validation_message_lists_all_errors() {
        let err = ConfigError::Validation(vec![
            ValidationError::MissingPrimary,
            ValidationError::ZeroQueueCapacity,
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: primary target is required, shadow queue capacity must be greater than zero"
        );
    }
}
