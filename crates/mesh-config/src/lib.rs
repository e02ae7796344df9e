// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Mesh Agent Configuration
//!
//! Type-safe configuration resolver for mesh agents with support for:
//! - TOML file parsing (`mesh_configuration.toml`)
//! - Programmatic overrides supplied by the embedding application
//! - Environment variable overrides
//!
//! Every setting resolves with the precedence
//! `environment > programmatic override > TOML file > built-in default`.
//! Each layer is parsed and validated on its own; an invalid value is logged
//! and resolution falls back to the next lower layer.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mesh_config::load_config;
//!
//! let config = load_config(None, None).expect("Failed to load config");
//! println!("Registry: {}", config.registry.url);
//! println!("Heartbeat every {}s", config.heartbeat.interval_secs);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod keys;
pub mod loader;
pub mod types;
pub mod validation;

pub use keys::{resolve_config, ConfigKey};
pub use loader::{apply_overrides, find_config_file, load_config, CONFIG_FILE_NAME};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = MeshConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: MeshConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.registry.url, config.registry.url);
        assert_eq!(parsed.heartbeat.interval_secs, config.heartbeat.interval_secs);
    }
}
