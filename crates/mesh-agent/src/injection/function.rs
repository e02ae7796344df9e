// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Injection wrappers
//!
//! A wrapper owns the user function and its ordered dependency table. On
//! every call it resolves each declared parameter that was not supplied
//! explicitly, then hands the function a `Dependencies` view. Values are
//! resolved once at call start; later registry updates apply to the next
//! call.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use futures::FutureExt;

use super::injector::InjectorInner;
use super::registry::DependencyRegistry;
use crate::capability::{Capability, CapabilityHandle};
use crate::declaration::{DependencySpec, ToolSpec};

/// Stable identity of one wrapped function
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionKey {
    name: String,
    id: u64,
}

impl FunctionKey {
    pub(crate) fn new(name: impl Into<String>, id: u64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    /// Function name as declared to the registry
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

/// Whether a wrapper is called directly or awaited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    Blocking,
    Awaitable,
}

/// Values supplied by the caller, keyed by target parameter
///
/// An explicit entry always wins over the registry, including an explicit
/// `None`.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    values: HashMap<String, Option<CapabilityHandle>>,
}

impl Overrides {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, parameter: impl Into<String>, value: CapabilityHandle) -> Self {
        self.values.insert(parameter.into(), Some(value));
        self
    }

    /// Force `parameter` to be unresolved for this call
    pub fn without(mut self, parameter: impl Into<String>) -> Self {
        self.values.insert(parameter.into(), None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn take(&mut self, parameter: &str) -> Option<Option<CapabilityHandle>> {
        self.values.remove(parameter)
    }
}

/// Resolved dependencies handed to a wrapped function, in declaration order
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    slots: Vec<(String, Option<CapabilityHandle>)>,
}

impl Dependencies {
    /// Value for `parameter`, `None` when unresolved or undeclared
    pub fn get(&self, parameter: &str) -> Option<&CapabilityHandle> {
        self.slots
            .iter()
            .find(|(name, _)| name == parameter)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Value for `parameter` downcast to `T`
    pub fn get_as<T: Capability>(&self, parameter: &str) -> Option<&T> {
        self.get(parameter).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn is_resolved(&self, parameter: &str) -> bool {
        self.get(parameter).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&CapabilityHandle>)> {
        self.slots
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Contract shared by blocking and awaitable wrappers
pub trait Injectable: Send + Sync {
    fn key(&self) -> &FunctionKey;

    fn tool(&self) -> &ToolSpec;

    fn call_mode(&self) -> CallMode;

    /// Dependency table in declaration order
    fn dependencies(&self) -> &[DependencySpec] {
        self.tool().dependencies()
    }

    /// Resolve the dependency table as a call with `overrides` would
    fn resolve(&self, overrides: Overrides) -> Dependencies;
}

/// State shared by every handle of one wrapped function
///
/// Dropping the last handle releases the function's bookkeeping in the
/// injector, if the injector still exists.
pub(crate) struct WrapperCore {
    key: FunctionKey,
    tool: Arc<ToolSpec>,
    registry: Arc<DependencyRegistry>,
    owner: Weak<InjectorInner>,
}

impl WrapperCore {
    pub(crate) fn new(
        key: FunctionKey,
        tool: Arc<ToolSpec>,
        registry: Arc<DependencyRegistry>,
        owner: Weak<InjectorInner>,
    ) -> Self {
        Self {
            key,
            tool,
            registry,
            owner,
        }
    }

    pub(crate) fn key(&self) -> &FunctionKey {
        &self.key
    }

    fn resolve(&self, mut overrides: Overrides) -> Dependencies {
        let slots = self
            .tool
            .dependencies()
            .iter()
            .map(|spec| {
                let parameter = spec.target_parameter();
                let value = match overrides.take(parameter) {
                    Some(explicit) => explicit,
                    None => self.registry.lookup(self.key.name(), spec.capability()),
                };
                (parameter.to_string(), value)
            })
            .collect();
        Dependencies { slots }
    }
}

impl Drop for WrapperCore {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.release(&self.key);
        }
    }
}

pub(crate) type BlockingFn<A, R> = dyn Fn(A, &Dependencies) -> R + Send + Sync;
pub(crate) type AwaitableFn<A, R> = dyn Fn(A, Dependencies) -> BoxFuture<'static, R> + Send + Sync;

/// Wrapper around a synchronous function
pub struct BlockingInjectable<A, R> {
    core: Arc<WrapperCore>,
    function: Arc<BlockingFn<A, R>>,
}

impl<A, R> BlockingInjectable<A, R> {
    pub(crate) fn new<F>(core: WrapperCore, function: F) -> Self
    where
        F: Fn(A, &Dependencies) -> R + Send + Sync + 'static,
    {
        Self {
            core: Arc::new(core),
            function: Arc::new(function),
        }
    }

    pub(crate) fn from_parts(core: Arc<WrapperCore>, function: Arc<BlockingFn<A, R>>) -> Self {
        Self { core, function }
    }

    pub(crate) fn core(&self) -> &Arc<WrapperCore> {
        &self.core
    }

    pub fn call(&self, args: A) -> R {
        self.call_with(args, Overrides::none())
    }

    pub fn call_with(&self, args: A, overrides: Overrides) -> R {
        let dependencies = self.core.resolve(overrides);
        (self.function)(args, &dependencies)
    }
}

impl<A: 'static, R: 'static> BlockingInjectable<A, R> {
    pub(crate) fn erased_function(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::new(Arc::clone(&self.function))
    }
}

impl<A, R> Clone for BlockingInjectable<A, R> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            function: Arc::clone(&self.function),
        }
    }
}

impl<A, R> fmt::Debug for BlockingInjectable<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingInjectable")
            .field("key", &self.core.key)
            .finish()
    }
}

impl<A, R> Injectable for BlockingInjectable<A, R> {
    fn key(&self) -> &FunctionKey {
        &self.core.key
    }

    fn tool(&self) -> &ToolSpec {
        &self.core.tool
    }

    fn call_mode(&self) -> CallMode {
        CallMode::Blocking
    }

    fn resolve(&self, overrides: Overrides) -> Dependencies {
        self.core.resolve(overrides)
    }
}

/// Wrapper around an async function
pub struct AwaitableInjectable<A, R> {
    core: Arc<WrapperCore>,
    function: Arc<AwaitableFn<A, R>>,
}

impl<A, R> AwaitableInjectable<A, R>
where
    A: 'static,
    R: 'static,
{
    pub(crate) fn new<F, Fut>(core: WrapperCore, function: F) -> Self
    where
        F: Fn(A, Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        Self {
            core: Arc::new(core),
            function: Arc::new(
                move |args: A, dependencies: Dependencies| -> BoxFuture<'static, R> {
                    function(args, dependencies).boxed()
                },
            ),
        }
    }

    pub(crate) fn from_parts(core: Arc<WrapperCore>, function: Arc<AwaitableFn<A, R>>) -> Self {
        Self { core, function }
    }

    pub(crate) fn core(&self) -> &Arc<WrapperCore> {
        &self.core
    }

    pub(crate) fn erased_function(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::new(Arc::clone(&self.function))
    }

    pub async fn call(&self, args: A) -> R {
        self.call_with(args, Overrides::none()).await
    }

    pub async fn call_with(&self, args: A, overrides: Overrides) -> R {
        let dependencies = self.core.resolve(overrides);
        (self.function)(args, dependencies).await
    }
}

impl<A, R> Clone for AwaitableInjectable<A, R> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            function: Arc::clone(&self.function),
        }
    }
}

impl<A, R> fmt::Debug for AwaitableInjectable<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitableInjectable")
            .field("key", &self.core.key)
            .finish()
    }
}

impl<A, R> Injectable for AwaitableInjectable<A, R> {
    fn key(&self) -> &FunctionKey {
        &self.core.key
    }

    fn tool(&self) -> &ToolSpec {
        &self.core.tool
    }

    fn call_mode(&self) -> CallMode {
        CallMode::Awaitable
    }

    fn resolve(&self, overrides: Overrides) -> Dependencies {
        self.core.resolve(overrides)
    }
}
