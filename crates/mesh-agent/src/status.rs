// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Fast heartbeat classification
//!
//! Maps the outcome of `HEAD /heartbeat/{agent_id}` to what the heartbeat
//! loop should do next. Pure; nothing here touches the network.

use std::fmt;

use crate::error::{MeshError, Result};

/// Raw outcome of a fast heartbeat probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResponse {
    /// The registry answered with this status code
    Status(u16),
    /// Connection, DNS or timeout failure
    TransportFailure(String),
}

/// Semantic outcome of a fast heartbeat probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FastHeartbeatStatus {
    /// 200: nothing changed since the last reconciliation
    NoChanges,
    /// 202: a provider this agent depends on changed
    TopologyChanged,
    /// 410: the registry has no record of this agent
    AgentUnknown,
    /// 503: registry reachable but overloaded
    RegistryError,
    /// Transport failure
    NetworkError,
}

/// What the heartbeat loop does with a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Nothing to do this tick
    Skip,
    /// Re-declare everything and apply the returned bindings
    FullHeartbeat,
    /// Count a failure and try again next tick
    Retry,
}

impl FastHeartbeatStatus {
    pub const ALL: [FastHeartbeatStatus; 5] = [
        FastHeartbeatStatus::NoChanges,
        FastHeartbeatStatus::TopologyChanged,
        FastHeartbeatStatus::AgentUnknown,
        FastHeartbeatStatus::RegistryError,
        FastHeartbeatStatus::NetworkError,
    ];

    /// Classify a status code
    ///
    /// # Errors
    ///
    /// `MeshError::UnexpectedStatus` for any code outside the protocol.
    pub fn from_status_code(code: u16) -> Result<Self> {
        match code {
            200 => Ok(FastHeartbeatStatus::NoChanges),
            202 => Ok(FastHeartbeatStatus::TopologyChanged),
            410 => Ok(FastHeartbeatStatus::AgentUnknown),
            503 => Ok(FastHeartbeatStatus::RegistryError),
            other => Err(MeshError::UnexpectedStatus(other)),
        }
    }

    pub fn classify(response: &ProbeResponse) -> Result<Self> {
        match response {
            ProbeResponse::Status(code) => Self::from_status_code(*code),
            ProbeResponse::TransportFailure(_) => Ok(FastHeartbeatStatus::NetworkError),
        }
    }

    pub fn requires_full_heartbeat(&self) -> bool {
        matches!(
            self,
            FastHeartbeatStatus::TopologyChanged | FastHeartbeatStatus::AgentUnknown
        )
    }

    pub fn should_skip_for_resilience(&self) -> bool {
        matches!(
            self,
            FastHeartbeatStatus::RegistryError | FastHeartbeatStatus::NetworkError
        )
    }

    pub fn should_skip_for_optimization(&self) -> bool {
        matches!(self, FastHeartbeatStatus::NoChanges)
    }

    pub fn action(&self) -> HeartbeatAction {
        if self.requires_full_heartbeat() {
            HeartbeatAction::FullHeartbeat
        } else if self.should_skip_for_resilience() {
            HeartbeatAction::Retry
        } else {
            HeartbeatAction::Skip
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FastHeartbeatStatus::NoChanges => "no_changes",
            FastHeartbeatStatus::TopologyChanged => "topology_changed",
            FastHeartbeatStatus::AgentUnknown => "agent_unknown",
            FastHeartbeatStatus::RegistryError => "registry_error",
            FastHeartbeatStatus::NetworkError => "network_error",
        }
    }
}

impl fmt::Display for FastHeartbeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
