// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # mesh-observability
//!
//! Logging setup shared by the mesh crates, with per-crate debug flags.
//!
//! ## Features
//! - `file-logging`: per-run log folders with per-crate JSON files and retention

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Crate names accepted by `--debug-{crate}` and `MESH_DEBUG`
pub const KNOWN_CRATES: &[&str] = &["meshcore", "mesh-agent", "mesh-config"];

/// Tracing target for a crate name (`mesh-agent` logs under `mesh_agent`)
pub fn crate_target(crate_name: &str) -> String {
    crate_name.replace('-', "_")
}
