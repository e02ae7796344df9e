// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Layers, lowest to highest:
//! 1. Built-in defaults (`MeshConfig::default()`)
//! 2. TOML file (optional)
//! 3. Programmatic overrides (`HashMap` keyed by `ConfigKey::name()`)
//! 4. Environment variables (`ConfigKey::env_var()`)

use crate::keys::{first_valid, parse_bool, ConfigKey, ValueSource};
use crate::{validate_config, ConfigError, ConfigResult, MeshConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "mesh_configuration.toml";

/// Find the mesh configuration file
///
/// Search order:
/// 1. `MESH_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 3 parent directories
///
/// A missing file is not an error (defaults apply) unless `MESH_CONFIG_PATH`
/// names a path that does not exist.
pub fn find_config_file() -> ConfigResult<Option<PathBuf>> {
    if let Ok(env_path) = env::var("MESH_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by MESH_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let Ok(cwd) = env::current_dir() else {
        return Ok(None);
    };

    let mut current = Some(cwd.as_path());
    for _ in 0..4 {
        let Some(dir) = current else {
            break;
        };
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Ok(Some(candidate));
        }
        current = dir.parent();
    }

    Ok(None)
}

/// Load configuration
///
/// # Arguments
///
/// * `config_path` - Optional path to a TOML file. If `None`, the file is searched for.
/// * `overrides` - Optional programmatic overrides
///
/// # Errors
///
/// Returns an error if an explicitly named file is missing or unreadable,
/// contains invalid TOML, or the resolved configuration fails validation.
pub fn load_config(
    config_path: Option<&Path>,
    overrides: Option<&HashMap<String, String>>,
) -> ConfigResult<MeshConfig> {
    let config_file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file()?,
    };

    let mut config = match config_file {
        Some(path) => {
            info!("[CONFIG] Loading configuration from {}", path.display());
            let content = fs::read_to_string(&path)?;
            toml::from_str::<MeshConfig>(&content)?
        }
        None => {
            debug!("[CONFIG] No {} found, using built-in defaults", CONFIG_FILE_NAME);
            MeshConfig::default()
        }
    };

    apply_overrides(&mut config, overrides);
    validate_config(&config)?;

    Ok(config)
}

/// Apply environment and programmatic overrides on top of `config`.
///
/// Per key the first valid value wins among: environment, programmatic
/// override, the value already in `config` (file or default), the
/// built-in default. Unknown override names are logged and ignored.
pub fn apply_overrides(config: &mut MeshConfig, overrides: Option<&HashMap<String, String>>) {
    if let Some(map) = overrides {
        for name in map.keys() {
            if ConfigKey::from_name(name).is_none() {
                debug!("[CONFIG] Ignoring unknown override '{}'", name);
            }
        }
    }

    for key in ConfigKey::ALL.iter().copied() {
        let env_value = env::var(key.env_var()).ok();
        let override_value = overrides.and_then(|map| map.get(key.name())).cloned();
        let current = current_value(config, key);

        let resolved = first_valid(
            key,
            [
                (ValueSource::Environment, env_value.as_deref()),
                (ValueSource::Programmatic, override_value.as_deref()),
                (ValueSource::Default, current.as_deref()),
                (ValueSource::Default, key.default_value()),
            ],
        );

        if let Some((_, value)) = resolved {
            assign(config, key, &value);
        }
    }
}

fn current_value(config: &MeshConfig, key: ConfigKey) -> Option<String> {
    match key {
        ConfigKey::RegistryUrl => Some(config.registry.url.clone()),
        ConfigKey::RequestTimeoutMs => Some(config.registry.request_timeout_ms.to_string()),
        ConfigKey::ProbeTimeoutMs => Some(config.registry.probe_timeout_ms.to_string()),
        ConfigKey::AgentName => Some(config.agent.name.clone()),
        ConfigKey::AgentId => config.agent.id.clone(),
        ConfigKey::Namespace => Some(config.agent.namespace.clone()),
        ConfigKey::AgentVersion => Some(config.agent.version.clone()),
        ConfigKey::HttpHost => Some(config.agent.http_host.clone()),
        ConfigKey::HttpPort => Some(config.agent.http_port.to_string()),
        ConfigKey::Endpoint => config.agent.endpoint.clone(),
        ConfigKey::HealthInterval => Some(config.heartbeat.interval_secs.to_string()),
        ConfigKey::MissedThreshold => Some(config.heartbeat.missed_threshold.to_string()),
        ConfigKey::Standalone => Some(config.heartbeat.standalone.to_string()),
        ConfigKey::ShutdownGraceMs => Some(config.heartbeat.shutdown_grace_ms.to_string()),
        ConfigKey::DeregisterOnShutdown => {
            Some(config.heartbeat.deregister_on_shutdown.to_string())
        }
        ConfigKey::LogLevel => Some(config.logging.level.clone()),
        ConfigKey::LogJson => Some(config.logging.json.to_string()),
    }
}

// Values reaching here already passed `ConfigKey::validate`.
fn assign(config: &mut MeshConfig, key: ConfigKey, value: &str) {
    match key {
        ConfigKey::RegistryUrl => config.registry.url = value.to_string(),
        ConfigKey::RequestTimeoutMs => {
            if let Ok(v) = value.parse() {
                config.registry.request_timeout_ms = v;
            }
        }
        ConfigKey::ProbeTimeoutMs => {
            if let Ok(v) = value.parse() {
                config.registry.probe_timeout_ms = v;
            }
        }
        ConfigKey::AgentName => config.agent.name = value.to_string(),
        ConfigKey::AgentId => config.agent.id = Some(value.to_string()),
        ConfigKey::Namespace => config.agent.namespace = value.to_string(),
        ConfigKey::AgentVersion => config.agent.version = value.to_string(),
        ConfigKey::HttpHost => config.agent.http_host = value.to_string(),
        ConfigKey::HttpPort => {
            if let Ok(v) = value.parse() {
                config.agent.http_port = v;
            }
        }
        ConfigKey::Endpoint => config.agent.endpoint = Some(value.to_string()),
        ConfigKey::HealthInterval => {
            if let Ok(v) = value.parse() {
                config.heartbeat.interval_secs = v;
            }
        }
        ConfigKey::MissedThreshold => {
            if let Ok(v) = value.parse() {
                config.heartbeat.missed_threshold = v;
            }
        }
        ConfigKey::Standalone => {
            if let Some(v) = parse_bool(value) {
                config.heartbeat.standalone = v;
            }
        }
        ConfigKey::ShutdownGraceMs => {
            if let Ok(v) = value.parse() {
                config.heartbeat.shutdown_grace_ms = v;
            }
        }
        ConfigKey::DeregisterOnShutdown => {
            if let Some(v) = parse_bool(value) {
                config.heartbeat.deregister_on_shutdown = v;
            }
        }
        ConfigKey::LogLevel => config.logging.level = value.to_string(),
        ConfigKey::LogJson => {
            if let Some(v) = parse_bool(value) {
                config.logging.json = v;
            }
        }
    }
}
