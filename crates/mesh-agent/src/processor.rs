// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Registration and heartbeat processor
//!
//! One task per agent process. Registration is attempted once at startup
//! and never fatal; afterwards every tick probes the registry cheaply and
//! only falls back to a full heartbeat when the topology changed, the
//! registry forgot the agent, or bindings were never confirmed. Results are
//! applied to the `DependencyInjector` as function-scoped bindings.
//!
//! Retries are unbounded and fixed-interval. Only shutdown stops the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mesh_config::{HeartbeatConfig, MeshConfig};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::capability::{CapabilityHandle, RemoteCapability};
use crate::client::{HttpRegistrationClient, RegistrationClient};
use crate::error::{MeshError, Result};
use crate::injection::DependencyInjector;
use crate::state::{AgentPhase, AgentRegistrationState};
use crate::status::{FastHeartbeatStatus, HeartbeatAction, ProbeResponse};
use crate::wire::{
    AgentMetadata, BindingSlot, RegistrationRequest, RegistrationResponse, ResolvedBindings,
    ToolDeclaration,
};

// Fixed seeds keep payload hashes comparable across ticks
const PAYLOAD_HASH_SEEDS: [u64; 4] = [
    0x6d65_7368_0000_0001,
    0x6d65_7368_0000_0002,
    0x6d65_7368_0000_0003,
    0x6d65_7368_0000_0004,
];

/// `<name>-<8 hex chars>`
pub fn generate_agent_id(name: &str) -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();
    format!("{}-{}", name, suffix)
}

/// What the agent announces about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub agent_id: String,
    pub name: String,
    pub version: String,
    pub namespace: String,
    pub endpoint: String,
}

impl AgentIdentity {
    /// Identity with a generated agent id, version `1.0.0`, namespace `default`
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            agent_id: generate_agent_id(&name),
            name,
            version: "1.0.0".to_string(),
            namespace: "default".to_string(),
            endpoint: endpoint.into(),
        }
    }

    pub fn with_agent_id(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Identity from resolved configuration. The id is generated unless configured.
    pub fn from_config(config: &MeshConfig) -> Self {
        let identity = Self::new(&config.agent.name, config.announced_endpoint())
            .with_version(&config.agent.version)
            .with_namespace(&config.agent.namespace);
        match &config.agent.id {
            Some(id) => identity.with_agent_id(id),
            None => identity,
        }
    }
}

/// Heartbeat loop policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    /// Consecutive failures before a registered agent drops to standalone
    pub missed_threshold: u32,
    /// Never contact the registry
    pub standalone: bool,
    /// How long shutdown waits for an in-flight tick before aborting it
    pub shutdown_grace: Duration,
    pub deregister_on_shutdown: bool,
}

impl HeartbeatSettings {
    pub fn from_config(config: &HeartbeatConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            missed_threshold: config.missed_threshold,
            standalone: config.standalone,
            shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
            deregister_on_shutdown: config.deregister_on_shutdown,
        }
    }
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self::from_config(&HeartbeatConfig::default())
    }
}

/// Result of one registration attempt or heartbeat tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was still running
    InFlight,
    /// Standalone override; the registry is never contacted
    Disabled,
    /// Probe reported no changes
    Unchanged,
    /// Full heartbeat succeeded; `bindings_changed` is false when the
    /// resolved set matched the one already applied
    Reconciled { bindings_changed: bool },
    /// Registry unreachable or failing; retried next tick
    Degraded {
        status: FastHeartbeatStatus,
        consecutive_failures: u32,
        dropped_to_standalone: bool,
    },
    /// Registry broke the protocol
    ContractViolation { message: String },
}

#[derive(Debug, Default)]
struct CycleMemory {
    /// Bindings applied by the last successful reconciliation
    last_applied: Option<ResolvedBindings>,
    /// Injector generation those bindings were applied against
    applied_generation: u64,
}

/// Drives registration and heartbeats for one agent
pub struct MeshAgentProcessor {
    identity: AgentIdentity,
    settings: HeartbeatSettings,
    injector: DependencyInjector,
    client: Arc<dyn RegistrationClient>,
    state: Mutex<AgentRegistrationState>,
    cycle: tokio::sync::Mutex<CycleMemory>,
}

impl MeshAgentProcessor {
    pub fn new(
        identity: AgentIdentity,
        settings: HeartbeatSettings,
        injector: DependencyInjector,
        client: Arc<dyn RegistrationClient>,
    ) -> Self {
        let state = AgentRegistrationState::new(identity.agent_id.clone());
        Self {
            identity,
            settings,
            injector,
            client,
            state: Mutex::new(state),
            cycle: tokio::sync::Mutex::new(CycleMemory::default()),
        }
    }

    /// Processor talking HTTP to the configured registry
    pub fn from_config(config: &MeshConfig, injector: DependencyInjector) -> Result<Self> {
        let client = HttpRegistrationClient::from_config(config)?;
        Ok(Self::new(
            AgentIdentity::from_config(config),
            HeartbeatSettings::from_config(&config.heartbeat),
            injector,
            Arc::new(client),
        ))
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn settings(&self) -> &HeartbeatSettings {
        &self.settings
    }

    pub fn injector(&self) -> &DependencyInjector {
        &self.injector
    }

    /// Snapshot of the registration state
    pub fn state(&self) -> AgentRegistrationState {
        self.state.lock().clone()
    }

    /// Declaration of every live wrapped function, batched into one request
    pub fn build_request(&self) -> RegistrationRequest {
        let metadata = self.metadata();
        self.track_payload(&metadata);

        RegistrationRequest {
            agent_id: self.identity.agent_id.clone(),
            timestamp: Utc::now(),
            metadata,
        }
    }

    fn metadata(&self) -> AgentMetadata {
        let tools: Vec<ToolDeclaration> = self
            .injector
            .declared_tools()
            .iter()
            .map(ToolDeclaration::from)
            .collect();

        AgentMetadata {
            name: self.identity.name.clone(),
            version: self.identity.version.clone(),
            namespace: self.identity.namespace.clone(),
            endpoint: self.identity.endpoint.clone(),
            tools,
        }
    }

    fn payload_hash(metadata: &AgentMetadata) -> Option<u64> {
        let text = serde_json::to_string(metadata).ok()?;
        let [k0, k1, k2, k3] = PAYLOAD_HASH_SEEDS;
        Some(ahash::RandomState::with_seeds(k0, k1, k2, k3).hash_one(&text))
    }

    /// Whether the live declarations differ from the last payload sent
    pub fn declarations_changed(&self) -> bool {
        let Some(hash) = Self::payload_hash(&self.metadata()) else {
            return false;
        };
        self.state.lock().last_payload_hash != Some(hash)
    }

    fn track_payload(&self, metadata: &AgentMetadata) {
        let Some(hash) = Self::payload_hash(metadata) else {
            return;
        };

        let mut state = self.state.lock();
        if state.last_payload_hash == Some(hash) {
            return;
        }
        if state.last_payload_hash.is_some() {
            info!(
                "[REGISTRY] Declared capabilities changed for {} ({} tools)",
                self.identity.agent_id,
                metadata.tools.len()
            );
        }
        state.last_payload_hash = Some(hash);
    }

    /// Required dependencies no function can currently resolve
    pub fn unresolved_required(&self) -> Vec<BindingSlot> {
        let mut missing = Vec::new();
        for tool in self.injector.declared_tools() {
            for dependency in tool.dependencies() {
                if dependency.is_optional() {
                    continue;
                }
                if self
                    .injector
                    .resolve(tool.function_name(), dependency.capability())
                    .is_none()
                {
                    missing.push(BindingSlot::new(
                        tool.function_name(),
                        dependency.capability(),
                    ));
                }
            }
        }
        missing
    }

    /// Initial batched registration
    ///
    /// Failure leaves the agent standalone; the heartbeat loop keeps trying.
    pub async fn register(&self) -> TickOutcome {
        if self.settings.standalone {
            self.state.lock().enter_standalone();
            info!(
                "[REGISTRY] Standalone mode: agent {} will not contact the registry",
                self.identity.agent_id
            );
            return TickOutcome::Disabled;
        }

        let mut cycle = self.cycle.lock().await;
        let request = self.build_request();
        info!(
            "[REGISTRY] Registering agent {} with {} tools",
            self.identity.agent_id,
            request.metadata.tools.len()
        );

        let outcome = match self.client.register(&request).await {
            Ok(response) => self.reconcile(&mut cycle, response, true),
            Err(e) => self.on_error(&mut cycle, e),
        };

        {
            let mut state = self.state.lock();
            if state.phase == AgentPhase::Unregistered {
                state.enter_standalone();
            }
        }
        if !matches!(outcome, TickOutcome::Reconciled { .. }) {
            warn!(
                "[REGISTRY] Registration of {} failed, serving standalone until the registry answers",
                self.identity.agent_id
            );
        }
        outcome
    }

    /// One heartbeat cycle. Skipped when another cycle is in flight.
    pub async fn tick(&self) -> TickOutcome {
        if self.settings.standalone {
            return TickOutcome::Disabled;
        }
        let Ok(mut cycle) = self.cycle.try_lock() else {
            debug!("[HEARTBEAT] Previous cycle still running, skipping tick");
            return TickOutcome::InFlight;
        };

        let probe = self.client.fast_heartbeat(&self.identity.agent_id).await;
        let status = match FastHeartbeatStatus::classify(&probe) {
            Ok(status) => status,
            Err(e) => return self.on_error(&mut cycle, e),
        };
        debug!(
            "[HEARTBEAT] Fast heartbeat for {}: {}",
            self.identity.agent_id, status
        );

        match status.action() {
            HeartbeatAction::Skip if cycle.last_applied.is_some() => {
                if self.declarations_changed() {
                    info!(
                        "[HEARTBEAT] Declared tools of {} changed, re-declaring",
                        self.identity.agent_id
                    );
                    return self.full_heartbeat(&mut cycle, status).await;
                }
                self.refresh_local_bindings(&mut cycle);
                self.state.lock().record_success(Utc::now());
                TickOutcome::Unchanged
            }
            HeartbeatAction::Skip | HeartbeatAction::FullHeartbeat => {
                self.full_heartbeat(&mut cycle, status).await
            }
            HeartbeatAction::Retry => {
                let reason = match &probe {
                    ProbeResponse::TransportFailure(reason) => reason.clone(),
                    ProbeResponse::Status(code) => format!("HTTP {}", code),
                };
                self.on_failure(&mut cycle, status, &reason)
            }
        }
    }

    async fn full_heartbeat(
        &self,
        cycle: &mut CycleMemory,
        status: FastHeartbeatStatus,
    ) -> TickOutcome {
        let force = status == FastHeartbeatStatus::AgentUnknown;
        if force {
            info!(
                "[HEARTBEAT] Registry does not know agent {}, re-declaring",
                self.identity.agent_id
            );
        }

        let request = self.build_request();
        match self.client.heartbeat(&request).await {
            Ok(response) => self.reconcile(cycle, response, force),
            Err(e) => self.on_error(cycle, e),
        }
    }

    fn reconcile(
        &self,
        cycle: &mut CycleMemory,
        response: RegistrationResponse,
        force: bool,
    ) -> TickOutcome {
        let bindings = match response.bindings() {
            Ok(bindings) => bindings,
            Err(e) => return self.on_error(cycle, e),
        };

        let generation = self.injector.generation();
        let changed = force
            || cycle.last_applied.as_ref() != Some(&bindings)
            || cycle.applied_generation != generation;
        if changed {
            self.apply_bindings(&bindings);
        }
        cycle.last_applied = Some(bindings);
        cycle.applied_generation = generation;

        let was_connected = {
            let mut state = self.state.lock();
            let was_connected = state.connected();
            state.record_success(Utc::now());
            was_connected
        };
        if !was_connected {
            info!("[REGISTRY] Agent {} registered", self.identity.agent_id);
        }

        let unresolved = self.unresolved_required();
        if !unresolved.is_empty() {
            let names: Vec<String> = unresolved
                .iter()
                .map(|slot| format!("{}.{}", slot.function, slot.capability))
                .collect();
            warn!(
                "[REGISTRY] {} required dependencies unresolved: {}",
                names.len(),
                names.join(", ")
            );
        }

        TickOutcome::Reconciled {
            bindings_changed: changed,
        }
    }

    /// Re-apply the last known bindings after functions were wrapped or
    /// released locally, without asking the registry
    fn refresh_local_bindings(&self, cycle: &mut CycleMemory) {
        let generation = self.injector.generation();
        if cycle.applied_generation == generation {
            return;
        }
        if let Some(bindings) = &cycle.last_applied {
            debug!("[HEARTBEAT] Wrapped functions changed, re-applying known bindings");
            self.apply_bindings(bindings);
        }
        cycle.applied_generation = generation;
    }

    /// Value bound for a resolved dependency
    ///
    /// A provider that is this agent binds the local wrapper directly; the
    /// agent would otherwise call itself over HTTP. `None` when that wrapper
    /// does not exist in this process.
    fn binding_value(&self, remote: &RemoteCapability) -> Option<CapabilityHandle> {
        if remote.agent_id != self.identity.agent_id {
            return Some(Arc::new(remote.clone()));
        }

        match self
            .injector
            .local_capability(&remote.capability, &remote.function_name)
        {
            Some(local) => {
                warn!(
                    "[REGISTRY] Self-dependency: '{}' is served by local function '{}', calling it directly",
                    remote.capability, remote.function_name
                );
                Some(Arc::new(local))
            }
            None => {
                error!(
                    "[REGISTRY] Self-dependency '{}' names local function '{}', which is not wrapped",
                    remote.capability, remote.function_name
                );
                None
            }
        }
    }

    /// Register every reported binding for the functions that declared it and
    /// clear every declared slot the registry left out or marked unresolved.
    fn apply_bindings(&self, bindings: &ResolvedBindings) {
        let tools = self.injector.declared_tools();
        let mut resolved = 0;
        let mut cleared = 0;

        for tool in &tools {
            for dependency in tool.dependencies() {
                let slot = BindingSlot::new(tool.function_name(), dependency.capability());
                let value = match bindings.get(&slot) {
                    Some(Some(remote)) => self.binding_value(remote),
                    _ => None,
                };
                match value {
                    Some(value) => {
                        self.injector
                            .register_dependency_for(&slot.function, &slot.capability, value);
                        resolved += 1;
                    }
                    None => {
                        if self
                            .injector
                            .unregister_dependency_for(&slot.function, &slot.capability)
                        {
                            cleared += 1;
                        }
                    }
                }
            }
        }

        for slot in bindings.keys() {
            if !tools.iter().any(|t| t.function_name() == slot.function) {
                debug!(
                    "[REGISTRY] Ignoring binding for undeclared function '{}'",
                    slot.function
                );
            }
        }

        info!(
            "[REGISTRY] Applied bindings for {}: {} resolved, {} cleared",
            self.identity.agent_id, resolved, cleared
        );
    }

    fn on_error(&self, cycle: &mut CycleMemory, error: MeshError) -> TickOutcome {
        if error.is_retryable() {
            let status = match error {
                MeshError::Transport(_) => FastHeartbeatStatus::NetworkError,
                _ => FastHeartbeatStatus::RegistryError,
            };
            return self.on_failure(cycle, status, &error.to_string());
        }

        error!(
            "[REGISTRY] Contract violation talking to registry for {}: {}",
            self.identity.agent_id, error
        );
        TickOutcome::ContractViolation {
            message: error.to_string(),
        }
    }

    fn on_failure(
        &self,
        cycle: &mut CycleMemory,
        status: FastHeartbeatStatus,
        reason: &str,
    ) -> TickOutcome {
        let (consecutive_failures, dropped) = {
            let mut state = self.state.lock();
            let dropped = state.record_failure(self.settings.missed_threshold);
            (state.consecutive_failures, dropped)
        };

        if dropped {
            // Next success must re-apply everything
            cycle.last_applied = None;
            warn!(
                "[HEARTBEAT] {} consecutive failures, agent {} is now standalone",
                consecutive_failures, self.identity.agent_id
            );
        } else {
            warn!(
                "[HEARTBEAT] {} for {} ({} consecutive failures): {}",
                status, self.identity.agent_id, consecutive_failures, reason
            );
        }

        TickOutcome::Degraded {
            status,
            consecutive_failures,
            dropped_to_standalone: dropped,
        }
    }

    /// Remove the agent from the registry
    ///
    /// Skipped in standalone mode or when disabled. Failures are logged only;
    /// `ProcessorHandle::shutdown` bounds the call by the shutdown grace.
    pub async fn deregister(&self) {
        if self.settings.standalone || !self.settings.deregister_on_shutdown {
            return;
        }

        match self.client.unregister_agent(&self.identity.agent_id).await {
            Ok(()) => info!("[REGISTRY] Agent {} deregistered", self.identity.agent_id),
            Err(e) => warn!(
                "[REGISTRY] Failed to deregister {}: {}",
                self.identity.agent_id, e
            ),
        }
        self.state.lock().phase = AgentPhase::Unregistered;
    }

    /// Spawn the heartbeat loop on the current tokio runtime
    pub fn start(self: Arc<Self>) -> ProcessorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let processor = Arc::clone(&self);
        let task = tokio::spawn(async move { processor.run(shutdown_rx).await });

        ProcessorHandle {
            processor: self,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "[HEARTBEAT] Starting for agent {} (interval {:?})",
            self.identity.agent_id, self.settings.interval
        );

        self.register().await;

        if self.settings.standalone {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
            return;
        }

        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.tick().await;
                    debug!("[HEARTBEAT] Tick outcome: {:?}", outcome);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("[HEARTBEAT] Loop stopped for agent {}", self.identity.agent_id);
    }
}

impl std::fmt::Debug for MeshAgentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshAgentProcessor")
            .field("identity", &self.identity)
            .field("settings", &self.settings)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// Running heartbeat loop
///
/// Dropping the handle without `shutdown()` also ends the loop, without
/// deregistering.
pub struct ProcessorHandle {
    processor: Arc<MeshAgentProcessor>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ProcessorHandle {
    pub fn processor(&self) -> &Arc<MeshAgentProcessor> {
        &self.processor
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop, abort it after the grace period, then deregister
    ///
    /// Each phase is bounded by `shutdown_grace`.
    pub async fn shutdown(self) {
        let ProcessorHandle {
            processor,
            shutdown,
            mut task,
        } = self;
        let grace = processor.settings.shutdown_grace;

        let _ = shutdown.send(true);
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => debug!("[HEARTBEAT] Loop exited cleanly"),
            Ok(Err(e)) => warn!("[HEARTBEAT] Loop ended abnormally: {}", e),
            Err(_) => {
                warn!(
                    "[HEARTBEAT] Loop did not stop within {:?}, aborting in-flight cycle",
                    grace
                );
                task.abort();
            }
        }

        if tokio::time::timeout(grace, processor.deregister())
            .await
            .is_err()
        {
            warn!(
                "[REGISTRY] Deregistration of {} did not finish within {:?}",
                processor.identity.agent_id, grace
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_agent_id_shape() {
        let id = generate_agent_id("weather");
        let suffix = id.strip_prefix("weather-").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_agent_id("weather"), id);
    }

    #[test]
    fn test_identity_from_config() {
        let mut config = MeshConfig::default();
        config.agent.name = "hello".to_string();
        config.agent.http_port = 9090;

        let identity = AgentIdentity::from_config(&config);
        assert!(identity.agent_id.starts_with("hello-"));
        assert_eq!(identity.endpoint, "http://localhost:9090");

        config.agent.id = Some("fixed-id".to_string());
        assert_eq!(AgentIdentity::from_config(&config).agent_id, "fixed-id");
    }

    #[test]
    fn test_settings_from_config() {
        let settings = HeartbeatSettings::default();
        assert_eq!(settings.interval, Duration::from_secs(5));
        assert_eq!(settings.missed_threshold, 4);
        assert!(!settings.standalone);
    }
}
