// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Whole-config checks that run after every layer has been applied.

use crate::{ConfigError, ConfigResult, MeshConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidUrl { field: String, value: String, reason: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidUrl {
                field,
                value,
                reason,
            } => {
                write!(f, "Invalid URL for {} ('{}'): {}", field, value, reason)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &MeshConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_urls(config, &mut errors);
    validate_required_fields(config, &mut errors);
    validate_value_ranges(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn check_http_url(field: &str, value: &str, errors: &mut Vec<ConfigValidationError>) {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => errors.push(ConfigValidationError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
            reason: format!("scheme must be http or https, got '{}'", parsed.scheme()),
        }),
        Err(e) => errors.push(ConfigValidationError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn validate_urls(config: &MeshConfig, errors: &mut Vec<ConfigValidationError>) {
    check_http_url("registry.url", &config.registry.url, errors);
    if let Some(endpoint) = &config.agent.endpoint {
        check_http_url("agent.endpoint", endpoint, errors);
    }
}

fn validate_required_fields(config: &MeshConfig, errors: &mut Vec<ConfigValidationError>) {
    let required = [
        ("agent.name", &config.agent.name),
        ("agent.namespace", &config.agent.namespace),
        ("agent.version", &config.agent.version),
        ("agent.http_host", &config.agent.http_host),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(ConfigValidationError::MissingRequired {
                field: field.to_string(),
            });
        }
    }

    if let Some(id) = &config.agent.id {
        if id.trim().is_empty() {
            errors.push(ConfigValidationError::InvalidValue {
                field: "agent.id".to_string(),
                reason: "must not be empty when set".to_string(),
            });
        }
    }
}

fn validate_value_ranges(config: &MeshConfig, errors: &mut Vec<ConfigValidationError>) {
    let positive = [
        ("heartbeat.interval_secs", config.heartbeat.interval_secs),
        (
            "heartbeat.missed_threshold",
            u64::from(config.heartbeat.missed_threshold),
        ),
        ("registry.request_timeout_ms", config.registry.request_timeout_ms),
        ("registry.probe_timeout_ms", config.registry.probe_timeout_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
    }

    if config.agent.http_port == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "agent.http_port".to_string(),
            reason: "must be between 1 and 65535".to_string(),
        });
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("must be one of: {}", valid_levels.join(", ")),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MeshConfig::default();
        let result = validate_config(&config);
        assert!(result.is_ok(), "Default config should be valid: {:?}", result);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = MeshConfig::default();
        config.heartbeat.interval_secs = 0;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("heartbeat.interval_secs"));
    }

    #[test]
    fn test_non_http_registry_rejected() {
        let mut config = MeshConfig::default();
        config.registry.url = "ftp://registry:21".to_string();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("registry.url"));
    }

    #[test]
    fn test_errors_are_collected() {
        let mut config = MeshConfig::default();
        config.agent.name = " ".to_string();
        config.heartbeat.missed_threshold = 0;
        config.logging.level = "loud".to_string();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("agent.name"));
        assert!(err.contains("heartbeat.missed_threshold"));
        assert!(err.contains("logging.level"));
    }
}
