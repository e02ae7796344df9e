// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Values stored in the dependency registry
//!
//! A resolved dependency is an opaque `Arc<dyn Capability>`. The injector
//! never calls into it; application code downcasts to the concrete type it
//! expects.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A value that can be injected as a dependency
///
/// ```rust
/// use std::any::Any;
/// use mesh_agent::Capability;
///
/// #[derive(Debug)]
/// struct Clock;
///
/// impl Capability for Clock {
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
pub trait Capability: Send + Sync + fmt::Debug + 'static {
    fn as_any(&self) -> &dyn Any;
}

impl dyn Capability {
    /// Borrow the concrete value if it is a `T`
    pub fn downcast_ref<T: Capability>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Capability>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Shared handle to an injected value
pub type CapabilityHandle = Arc<dyn Capability>;

/// Proxy for a capability served by another agent
///
/// Registered by the heartbeat processor for every dependency the registry
/// resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteCapability {
    /// Capability name that was requested
    pub capability: String,
    /// Agent serving the capability
    pub agent_id: String,
    /// Base URL of the serving agent
    pub endpoint: String,
    /// Function on the serving agent that implements the capability
    pub function_name: String,
}

impl RemoteCapability {
    pub fn new(
        capability: impl Into<String>,
        agent_id: impl Into<String>,
        endpoint: impl Into<String>,
        function_name: impl Into<String>,
    ) -> Self {
        Self {
            capability: capability.into(),
            agent_id: agent_id.into(),
            endpoint: endpoint.into(),
            function_name: function_name.into(),
        }
    }
}

impl fmt::Display for RemoteCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}::{} @ {}",
            self.capability, self.agent_id, self.function_name, self.endpoint
        )
    }
}

impl Capability for RemoteCapability {
    fn as_any(&self) -> &dyn Any {
        self
    }
}
