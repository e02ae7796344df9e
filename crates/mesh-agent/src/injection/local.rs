// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-process binding for a capability this agent serves itself
//!
//! When the registry resolves a dependency to a function of the same agent,
//! calling it over HTTP would re-enter the agent while it is handling the
//! outer call. A `LocalCapability` points at the live wrapper instead so the
//! dependent can call it directly.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use super::function::{
    AwaitableFn, AwaitableInjectable, BlockingFn, BlockingInjectable, CallMode, FunctionKey,
    WrapperCore,
};
use crate::capability::Capability;

/// Handle to a wrapped function of this process
pub struct LocalCapability {
    /// Capability name that was requested
    pub capability: String,
    /// Wrapped function implementing it
    pub function_name: String,
    key: FunctionKey,
    mode: CallMode,
    core: Weak<WrapperCore>,
    function: Arc<dyn Any + Send + Sync>,
}

impl LocalCapability {
    pub(crate) fn new(
        capability: impl Into<String>,
        key: FunctionKey,
        mode: CallMode,
        core: Weak<WrapperCore>,
        function: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            capability: capability.into(),
            function_name: key.name().to_string(),
            key,
            mode,
            core,
            function,
        }
    }

    pub fn key(&self) -> &FunctionKey {
        &self.key
    }

    pub fn call_mode(&self) -> CallMode {
        self.mode
    }

    /// Whether the target wrapper still has a live handle
    pub fn is_live(&self) -> bool {
        self.core.strong_count() > 0
    }

    /// Handle to the target as a blocking wrapper
    ///
    /// `None` when the target was released, is async, or has a different
    /// signature.
    pub fn blocking<A: 'static, R: 'static>(&self) -> Option<BlockingInjectable<A, R>> {
        if self.mode != CallMode::Blocking {
            return None;
        }
        let function = self.function.downcast_ref::<Arc<BlockingFn<A, R>>>()?;
        let core = self.core.upgrade()?;
        Some(BlockingInjectable::from_parts(core, Arc::clone(function)))
    }

    /// Handle to the target as an awaitable wrapper
    pub fn awaitable<A: 'static, R: 'static>(&self) -> Option<AwaitableInjectable<A, R>> {
        if self.mode != CallMode::Awaitable {
            return None;
        }
        let function = self.function.downcast_ref::<Arc<AwaitableFn<A, R>>>()?;
        let core = self.core.upgrade()?;
        Some(AwaitableInjectable::from_parts(core, Arc::clone(function)))
    }
}

impl Capability for LocalCapability {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for LocalCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCapability")
            .field("capability", &self.capability)
            .field("function", &self.key)
            .field("mode", &self.mode)
            .field("live", &self.is_live())
            .finish()
    }
}

impl fmt::Display for LocalCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> local {}", self.capability, self.key)
    }
}
