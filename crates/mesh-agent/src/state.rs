// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Registration state of one agent process
//!
//! ```text
//! Unregistered ──fail──▶ Standalone ◀──threshold failures── Registered
//!      │                     │                                  ▲
//!      │                     └──────────── success ─────────────┤
//!      └────────────────────────────────── success ─────────────┘
//! ```
//!
//! `connected` only reflects the registry link. Capabilities stay callable
//! in every phase.

use chrono::{DateTime, Utc};

/// Registry link phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    /// Before the first registration attempt
    Unregistered,
    /// Serving without a confirmed registry link
    Standalone,
    /// Registry confirmed the agent and its bindings
    Registered,
}

/// Per-process registration bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRegistrationState {
    pub agent_id: String,
    pub phase: AgentPhase,
    /// Hash of the last declaration sent
    pub last_payload_hash: Option<u64>,
    /// Last successful contact with the registry
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Successful heartbeats (fast or full) since start
    pub heartbeat_count: u64,
}

impl AgentRegistrationState {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            phase: AgentPhase::Unregistered,
            last_payload_hash: None,
            last_heartbeat_at: None,
            consecutive_failures: 0,
            heartbeat_count: 0,
        }
    }

    pub fn connected(&self) -> bool {
        self.phase == AgentPhase::Registered
    }

    /// Registry confirmed the agent
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.phase = AgentPhase::Registered;
        self.consecutive_failures = 0;
        self.last_heartbeat_at = Some(at);
        self.heartbeat_count += 1;
    }

    /// Registry could not be reached or refused
    ///
    /// A registered agent drops to standalone only after `missed_threshold`
    /// consecutive failures. Returns `true` when this call caused the drop.
    pub fn record_failure(&mut self, missed_threshold: u32) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        match self.phase {
            AgentPhase::Registered if self.consecutive_failures >= missed_threshold.max(1) => {
                self.phase = AgentPhase::Standalone;
                true
            }
            AgentPhase::Unregistered => {
                self.phase = AgentPhase::Standalone;
                false
            }
            _ => false,
        }
    }

    /// Serve without the registry
    pub fn enter_standalone(&mut self) {
        self.phase = AgentPhase::Standalone;
    }
}
