// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Mesh agent runtime
//!
//! Two cooperating pieces:
//! - **Dependency injection**: functions declare the capabilities they need;
//!   on every call the wrapper fills in whatever the registry currently
//!   resolves, or `None`. Bindings can change at any time without
//!   re-wrapping.
//! - **Registration heartbeat**: one background task per process registers
//!   the agent's tools, probes the registry every interval, reconciles when
//!   the topology changed, and keeps serving standalone while the registry
//!   is unreachable.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use mesh_agent::{DependencyInjector, DependencySpec, MeshAgentProcessor, ToolSpec};
//!
//! let injector = DependencyInjector::new();
//! let greet = injector.create_injection_wrapper(
//!     ToolSpec::new("greet").depends_on(DependencySpec::new("date_service")),
//!     |name: String, deps: &mesh_agent::Dependencies| {
//!         let available = deps.is_resolved("date_service");
//!         format!("{}:{}", name, if available { "online" } else { "unavailable" })
//!     },
//! );
//!
//! let config = mesh_config::load_config(None, None)?;
//! let processor = Arc::new(MeshAgentProcessor::from_config(&config, injector.clone())?);
//! let handle = processor.start();
//!
//! println!("{}", greet.call("Alice".to_string()));
//! handle.shutdown().await;
//! ```
//!
//! # Error Handling
//!
//! Capability calls never fail because of the registry. Heartbeat errors
//! are logged and reported as `TickOutcome`s:
//! - **Retryable**: transport failures and registry 5xx, retried next tick
//! - **Contract violations**: malformed responses and unknown status codes
//!
//! # Thread Safety
//!
//! `DependencyInjector` is a cheap-clone handle over shared state. Registry
//! writes swap an `Arc` per key, so calls never observe a partial update.

pub mod capability;
pub mod client;
pub mod declaration;
pub mod error;
pub mod injection;
pub mod processor;
pub mod state;
pub mod status;
pub mod wire;

// Re-export main types for convenience
pub use capability::{Capability, CapabilityHandle, RemoteCapability};
pub use client::{HttpRegistrationClient, RegistrationClient};
pub use declaration::{DependencySpec, ToolSpec};
pub use error::{MeshError, Result};
pub use injection::{
    AwaitableInjectable, BlockingInjectable, CallMode, Dependencies, DependencyInjector,
    DependencyKey, DependencyRegistry, FunctionKey, Injectable, LocalCapability, Overrides,
};
pub use processor::{
    generate_agent_id, AgentIdentity, HeartbeatSettings, MeshAgentProcessor, ProcessorHandle,
    TickOutcome,
};
pub use state::{AgentPhase, AgentRegistrationState};
pub use status::{FastHeartbeatStatus, HeartbeatAction, ProbeResponse};
pub use wire::{BindingSlot, RegistrationRequest, RegistrationResponse, ResolvedBindings};
