// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration, injection and heartbeat wired together through the umbrella crate

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use meshcore::config::load_config;
use meshcore::prelude::*;
use meshcore::wire::{FunctionResolution, ResolutionStatus, ResolvedDependency, ToolInfo};
use meshcore::{
    AgentIdentity, AgentPhase, HeartbeatSettings, ProbeResponse, RegistrationClient,
    RegistrationRequest, RegistrationResponse,
};
use parking_lot::Mutex;

#[derive(Debug)]
struct FixedDate(&'static str);

impl Capability for FixedDate {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Registry that is down until `online` is flipped
struct FlakyRegistry {
    online: Mutex<bool>,
    calls: AtomicUsize,
}

impl FlakyRegistry {
    fn answer(&self) -> meshcore::Result<RegistrationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !*self.online.lock() {
            return Err(MeshError::Transport("connection refused".into()));
        }
        Ok(RegistrationResponse {
            status: RegistrationResponse::SUCCESS.to_string(),
            message: None,
            dependencies_resolved: vec![FunctionResolution {
                function_name: "greet".to_string(),
                capability: Some("greet".to_string()),
                dependencies: vec![ResolvedDependency {
                    capability: "date_service".to_string(),
                    status: ResolutionStatus::Resolved,
                    mcp_tool_info: Some(ToolInfo {
                        agent_id: "clock-7".to_string(),
                        endpoint: "http://clock:9000".to_string(),
                        function_name: "today".to_string(),
                    }),
                }],
            }],
        })
    }
}

#[async_trait]
impl RegistrationClient for FlakyRegistry {
    async fn register(&self, _request: &RegistrationRequest) -> meshcore::Result<RegistrationResponse> {
        self.answer()
    }

    async fn heartbeat(&self, _request: &RegistrationRequest) -> meshcore::Result<RegistrationResponse> {
        self.answer()
    }

    async fn fast_heartbeat(&self, _agent_id: &str) -> ProbeResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.online.lock() {
            ProbeResponse::Status(200)
        } else {
            ProbeResponse::TransportFailure("connection refused".into())
        }
    }

    async fn unregister_agent(&self, _agent_id: &str) -> meshcore::Result<()> {
        Ok(())
    }
}

fn greet(injector: &DependencyInjector) -> meshcore::BlockingInjectable<&'static str, String> {
    injector.create_injection_wrapper(
        ToolSpec::new("greet").depends_on(DependencySpec::new("date_service")),
        |name: &'static str, deps: &Dependencies| {
            if let Some(remote) = deps.get_as::<RemoteCapability>("date_service") {
                format!("{}:{}", name, remote.agent_id)
            } else if let Some(date) = deps.get_as::<FixedDate>("date_service") {
                format!("{}:{}", name, date.0)
            } else {
                format!("{}:unavailable", name)
            }
        },
    )
}

#[test]
fn test_greet_with_local_date_and_overrides() {
    let injector = DependencyInjector::new();
    injector.register_dependency("date_service", Arc::new(FixedDate("2024-01-20")));
    let greet = greet(&injector);

    assert_eq!(greet.call("Alice"), "Alice:2024-01-20");
    assert_eq!(
        greet.call_with(
            "Bob",
            Overrides::none().with("date_service", Arc::new(FixedDate("OVERRIDE")))
        ),
        "Bob:OVERRIDE"
    );

    injector.unregister_dependency("date_service");
    assert_eq!(greet.call("Carl"), "Carl:unavailable");
}

#[tokio::test]
async fn test_agent_serves_locally_then_converges_on_remote_binding() {
    let injector = DependencyInjector::new();
    injector.register_dependency("date_service", Arc::new(FixedDate("2024-01-20")));
    let greet = greet(&injector);

    let registry = Arc::new(FlakyRegistry {
        online: Mutex::new(false),
        calls: AtomicUsize::new(0),
    });
    let processor = MeshAgentProcessor::new(
        AgentIdentity::new("hello", "http://localhost:8080"),
        HeartbeatSettings::default(),
        injector.clone(),
        Arc::clone(&registry) as Arc<dyn RegistrationClient>,
    );

    processor.register().await;
    processor.tick().await;
    assert_eq!(processor.state().phase, AgentPhase::Standalone);
    assert_eq!(greet.call("Alice"), "Alice:2024-01-20");

    *registry.online.lock() = true;
    assert!(matches!(
        processor.tick().await,
        TickOutcome::Reconciled { .. }
    ));
    assert_eq!(processor.state().phase, AgentPhase::Registered);
    // Function-scoped remote binding shadows the process-wide local one
    assert_eq!(greet.call("Alice"), "Alice:clock-7");
    assert!(registry.calls.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn test_standalone_config_never_contacts_registry() {
    let overrides = HashMap::from([
        ("agent_name".to_string(), "offline".to_string()),
        ("standalone".to_string(), "true".to_string()),
        ("registry_url".to_string(), "http://127.0.0.1:1".to_string()),
    ]);
    let config = load_config(None, Some(&overrides)).unwrap();
    assert!(config.heartbeat.standalone);

    let injector = DependencyInjector::new();
    let greet = greet(&injector);
    let processor = Arc::new(MeshAgentProcessor::from_config(&config, injector).unwrap());
    assert!(processor.identity().agent_id.starts_with("offline-"));

    let handle = Arc::clone(&processor).start();
    tokio::task::yield_now().await;
    assert_eq!(greet.call("Dee"), "Dee:unavailable");
    handle.shutdown().await;
    assert_eq!(processor.state().phase, AgentPhase::Standalone);
}
