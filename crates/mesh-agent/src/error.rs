// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the mesh agent runtime

/// Result type alias using MeshError
pub type Result<T> = std::result::Result<T, MeshError>;

/// Error types for the mesh agent runtime
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    /// Connection, DNS or timeout failure talking to the registry
    #[error("Transport error: {0}")]
    Transport(String),

    /// Registry reachable but failing (5xx)
    #[error("Registry error (HTTP {status}): {message}")]
    Registry { status: u16, message: String },

    /// Registry answered with a non-success status field
    #[error("Registry rejected request: {0}")]
    Rejected(String),

    /// Status code outside the heartbeat protocol
    #[error("Unexpected status code from registry: {0}")]
    UnexpectedStatus(u16),

    /// Malformed or inconsistent registry response
    #[error("Registry contract violation: {0}")]
    ContractViolation(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] mesh_config::ConfigError),
}

impl MeshError {
    /// Check if error is retryable on the next heartbeat tick
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MeshError::Transport(_) | MeshError::Registry { .. } | MeshError::Rejected(_)
        )
    }

    /// Registry broke the wire contract; retrying will not help
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            MeshError::UnexpectedStatus(_) | MeshError::ContractViolation(_)
        )
    }
}

impl From<reqwest::Error> for MeshError {
    fn from(err: reqwest::Error) -> Self {
        MeshError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(MeshError::Transport("refused".into()).is_retryable());
        assert!(MeshError::Registry {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());
        assert!(!MeshError::ContractViolation("bad".into()).is_retryable());
        assert!(MeshError::UnexpectedStatus(418).is_contract_violation());
        assert!(!MeshError::InvalidConfig("x".into()).is_contract_violation());
    }
}
