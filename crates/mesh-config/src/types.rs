// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines the configuration structs that map to sections in
//! `mesh_configuration.toml`.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MeshConfig {
    pub registry: RegistryConfig,
    pub agent: AgentConfig,
    pub heartbeat: HeartbeatConfig,
    pub logging: LoggingConfig,
}

impl MeshConfig {
    /// Endpoint announced to the registry.
    ///
    /// An explicit `agent.endpoint` wins; otherwise it is derived from the
    /// HTTP host and port the transport listens on.
    pub fn announced_endpoint(&self) -> String {
        match &self.agent.endpoint {
            Some(endpoint) if !endpoint.is_empty() => endpoint.clone(),
            _ => format!("http://{}:{}", self.agent.http_host, self.agent.http_port),
        }
    }
}

/// Registry connection settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub url: String,
    /// Timeout for registration and full heartbeat calls
    pub request_timeout_ms: u64,
    /// Timeout for the fast HEAD probe
    pub probe_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            request_timeout_ms: 30_000,
            probe_timeout_ms: 5_000,
        }
    }
}

/// Identity the agent announces to the registry
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// Explicit agent id; generated from `name` when absent
    pub id: Option<String>,
    pub namespace: String,
    pub version: String,
    pub http_host: String,
    pub http_port: u16,
    pub endpoint: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "mesh-agent".to_string(),
            id: None,
            namespace: "default".to_string(),
            version: "1.0.0".to_string(),
            http_host: "localhost".to_string(),
            http_port: 8080,
            endpoint: None,
        }
    }
}

/// Heartbeat loop policy
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval_secs: u64,
    /// Consecutive failures before a registered agent drops to standalone
    pub missed_threshold: u32,
    /// Never contact the registry
    pub standalone: bool,
    pub shutdown_grace_ms: u64,
    pub deregister_on_shutdown: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            missed_threshold: 4,
            standalone: false,
            shutdown_grace_ms: 2_000,
            deregister_on_shutdown: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
