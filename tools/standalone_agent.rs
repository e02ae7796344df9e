// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Standalone mesh agent

Declares a `greet` function that depends on `date_service`, registers with
the configured registry and heartbeats until Ctrl-C. With the registry
down the agent keeps serving, falling back to a local date provider.

Usage:
  cargo run --bin standalone_agent
  MESH_REGISTRY_URL=http://localhost:8000 cargo run --bin standalone_agent -- --debug-mesh-agent
  MESH_STANDALONE=true cargo run --bin standalone_agent
*/

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use meshcore::config::load_config;
use meshcore::observability::{init_console_logging, parse_debug_flags, LoggingConfig};
use meshcore::prelude::*;
use tracing::info;

/// Local fallback for `date_service`
#[derive(Debug)]
struct LocalDate;

impl LocalDate {
    fn today(&self) -> String {
        chrono::Local::now().format("%Y-%m-%d").to_string()
    }
}

impl Capability for LocalDate {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config(None, None).context("loading mesh configuration")?;

    let logging = LoggingConfig::console(config.logging.level.clone(), config.logging.json);
    init_console_logging(&logging, &parse_debug_flags())?;

    let injector = DependencyInjector::new();
    injector.register_dependency("date_service", Arc::new(LocalDate));

    let greet = injector.create_injection_wrapper(
        ToolSpec::new("greet")
            .with_tag("demo")
            .depends_on(DependencySpec::new("date_service")),
        |name: &'static str, deps: &Dependencies| {
            if let Some(remote) = deps.get_as::<RemoteCapability>("date_service") {
                format!("{}:served-by-{}", name, remote.agent_id)
            } else if let Some(local) = deps.get_as::<LocalDate>("date_service") {
                format!("{}:{}", name, local.today())
            } else {
                format!("{}:unavailable", name)
            }
        },
    );

    let processor = Arc::new(MeshAgentProcessor::from_config(&config, injector)?);
    info!(
        "Agent {} starting (registry {})",
        processor.identity().agent_id,
        config.registry.url
    );
    let handle = Arc::clone(&processor).start();

    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let state = processor.state();
                info!(
                    "{} (phase {:?}, {} consecutive failures)",
                    greet.call("Alice"),
                    state.phase,
                    state.consecutive_failures
                );
            }
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl-C")?;
                break;
            }
        }
    }

    info!("Shutting down");
    handle.shutdown().await;
    Ok(())
}
