// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # meshcore
//!
//! Dependency injection and resilient registry registration for agents in a
//! capability mesh. Functions declare the capabilities they depend on, get
//! wrapped by a [`DependencyInjector`], and stay callable whether or not the
//! registry is reachable. A [`MeshAgentProcessor`] registers the agent,
//! heartbeats, and applies the bindings the registry resolves.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use meshcore::prelude::*;
//!
//! let config = meshcore::config::load_config(None, None)?;
//! let injector = DependencyInjector::new();
//! let greet = injector.create_injection_wrapper(
//!     ToolSpec::new("greet").depends_on(DependencySpec::new("date_service")),
//!     |name: String, deps: &Dependencies| format!("{}:{}", name, deps.is_resolved("date_service")),
//! );
//!
//! let processor = Arc::new(MeshAgentProcessor::from_config(&config, injector)?);
//! let handle = processor.start();
//! // ... serve ...
//! handle.shutdown().await;
//! ```
//!
//! ## Feature Flags
//!
//! - **`config`** (default): TOML/env configuration loading via `mesh-config`
//! - **`file-logging`**: per-run log folders via `mesh-observability`

pub use mesh_agent::*;

/// Configuration loading (`mesh_configuration.toml`, `MESH_*` env vars)
#[cfg(feature = "config")]
pub mod config {
    pub use mesh_config::*;
}

/// Logging setup and per-crate debug flags
pub mod observability {
    pub use mesh_observability::*;
}

pub mod prelude {
    pub use mesh_agent::{
        Capability, CapabilityHandle, Dependencies, DependencyInjector, DependencySpec,
        Injectable, MeshAgentProcessor, MeshError, Overrides, RemoteCapability, TickOutcome,
        ToolSpec,
    };
}

/// Version of the umbrella crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
