// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Dependency injector
//!
//! Owns the registry and the bookkeeping of wrapped functions. Cloning is
//! cheap; every clone shares the same state.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info};

use super::function::{
    AwaitableInjectable, BlockingInjectable, CallMode, Dependencies, FunctionKey, WrapperCore,
};
use super::local::LocalCapability;
use super::registry::{DependencyKey, DependencyRegistry};
use crate::capability::CapabilityHandle;
use crate::declaration::ToolSpec;

/// One live wrapped function
struct TrackedFunction {
    tool: Arc<ToolSpec>,
    mode: CallMode,
    core: Weak<WrapperCore>,
    /// `Arc<BlockingFn<A, R>>` or `Arc<AwaitableFn<A, R>>`
    function: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct Bookkeeping {
    functions: HashMap<FunctionKey, TrackedFunction>,
    /// capability -> functions depending on it
    dependents: HashMap<String, BTreeSet<FunctionKey>>,
}

impl Bookkeeping {
    /// Newest live key per function name
    fn newest(&self) -> BTreeMap<&str, &FunctionKey> {
        let mut newest: BTreeMap<&str, &FunctionKey> = BTreeMap::new();
        for key in self.functions.keys() {
            match newest.get(key.name()) {
                Some(existing) if existing.id() > key.id() => {}
                _ => {
                    newest.insert(key.name(), key);
                }
            }
        }
        newest
    }
}

pub(crate) struct InjectorInner {
    registry: Arc<DependencyRegistry>,
    book: RwLock<Bookkeeping>,
    next_id: AtomicU64,
    /// Bumped whenever a function is wrapped or released
    generation: AtomicU64,
}

impl InjectorInner {
    /// Forget a wrapped function once its last handle is gone
    ///
    /// Function-scoped bindings are dropped when no other live wrapper
    /// shares the function name.
    pub(crate) fn release(&self, key: &FunctionKey) {
        // Dropped after the lock: the user function may own other wrappers
        let released: TrackedFunction;
        let name_still_live = {
            let mut book = self.book.write();
            let Some(tracked) = book.functions.remove(key) else {
                return;
            };
            for dependency in tracked.tool.dependencies() {
                if let Some(functions) = book.dependents.get_mut(dependency.capability()) {
                    functions.remove(key);
                    if functions.is_empty() {
                        book.dependents.remove(dependency.capability());
                    }
                }
            }
            released = tracked;
            book.functions.keys().any(|k| k.name() == key.name())
        };
        self.generation.fetch_add(1, Ordering::SeqCst);

        let scoped_removed = if name_still_live {
            0
        } else {
            self.registry.remove_function(key.name())
        };
        debug!(
            "[INJECT] Released {} ({} scoped bindings dropped)",
            key, scoped_removed
        );
        drop(released);
    }
}

/// Registers resolved dependencies and builds injection wrappers
#[derive(Clone)]
pub struct DependencyInjector {
    inner: Arc<InjectorInner>,
}

impl DependencyInjector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(InjectorInner {
                registry: Arc::new(DependencyRegistry::new()),
                book: RwLock::new(Bookkeeping::default()),
                next_id: AtomicU64::new(1),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn registry(&self) -> &DependencyRegistry {
        &self.inner.registry
    }

    /// Set the process-wide value for `capability`
    ///
    /// Last write wins. Calls already in flight keep the value they started with.
    pub fn register_dependency(&self, capability: &str, value: CapabilityHandle) {
        self.inner
            .registry
            .register(DependencyKey::capability(capability), value);
        info!(
            "[INJECT] Registered '{}' ({} dependent functions)",
            capability,
            self.dependent_count(capability)
        );
    }

    /// Clear the process-wide value for `capability`. Idempotent.
    ///
    /// Returns whether a value was present.
    pub fn unregister_dependency(&self, capability: &str) -> bool {
        let removed = self
            .inner
            .registry
            .unregister(&DependencyKey::capability(capability))
            .is_some();
        if removed {
            info!("[INJECT] Unregistered '{}'", capability);
        }
        removed
    }

    /// Set the value `function` sees for `capability`
    pub fn register_dependency_for(&self, function: &str, capability: &str, value: CapabilityHandle) {
        self.inner
            .registry
            .register(DependencyKey::scoped(function, capability), value);
    }

    /// Clear the value `function` sees for `capability`. Idempotent.
    pub fn unregister_dependency_for(&self, function: &str, capability: &str) -> bool {
        self.inner
            .registry
            .unregister(&DependencyKey::scoped(function, capability))
            .is_some()
    }

    /// Process-wide value for `capability`
    pub fn get_dependency(&self, capability: &str) -> Option<CapabilityHandle> {
        self.inner.registry.get(&DependencyKey::capability(capability))
    }

    /// Value `function` would receive for `capability` right now
    pub fn resolve(&self, function: &str, capability: &str) -> Option<CapabilityHandle> {
        self.inner.registry.lookup(function, capability)
    }

    /// Changes whenever a function is wrapped or released
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn core_for(&self, tool: Arc<ToolSpec>) -> WrapperCore {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let key = FunctionKey::new(tool.function_name(), id);
        WrapperCore::new(
            key,
            tool,
            Arc::clone(&self.inner.registry),
            Arc::downgrade(&self.inner),
        )
    }

    fn track(
        &self,
        tool: Arc<ToolSpec>,
        core: &Arc<WrapperCore>,
        mode: CallMode,
        function: Arc<dyn Any + Send + Sync>,
    ) {
        let key = core.key().clone();
        let dependency_count = tool.dependencies().len();
        {
            let mut book = self.inner.book.write();
            for dependency in tool.dependencies() {
                book.dependents
                    .entry(dependency.capability().to_string())
                    .or_default()
                    .insert(key.clone());
            }
            book.functions.insert(
                key.clone(),
                TrackedFunction {
                    tool,
                    mode,
                    core: Arc::downgrade(core),
                    function,
                },
            );
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);

        debug!(
            "[INJECT] Wrapped {} with {} dependencies",
            key, dependency_count
        );
    }

    /// Wrap a synchronous function
    ///
    /// The function receives its own arguments plus the dependencies declared
    /// in `tool`, resolved at call time.
    pub fn create_injection_wrapper<A, R, F>(&self, tool: ToolSpec, function: F) -> BlockingInjectable<A, R>
    where
        A: 'static,
        R: 'static,
        F: Fn(A, &Dependencies) -> R + Send + Sync + 'static,
    {
        let tool = Arc::new(tool);
        let wrapper = BlockingInjectable::new(self.core_for(Arc::clone(&tool)), function);
        self.track(tool, wrapper.core(), CallMode::Blocking, wrapper.erased_function());
        wrapper
    }

    /// Wrap an async function
    pub fn create_async_injection_wrapper<A, R, F, Fut>(
        &self,
        tool: ToolSpec,
        function: F,
    ) -> AwaitableInjectable<A, R>
    where
        A: 'static,
        R: 'static,
        F: Fn(A, Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let tool = Arc::new(tool);
        let wrapper = AwaitableInjectable::new(self.core_for(Arc::clone(&tool)), function);
        self.track(tool, wrapper.core(), CallMode::Awaitable, wrapper.erased_function());
        wrapper
    }

    /// In-process handle to the newest live wrapper named `function_name`
    pub fn local_capability(&self, capability: &str, function_name: &str) -> Option<LocalCapability> {
        let book = self.inner.book.read();
        let key = *book.newest().get(function_name)?;
        let tracked = book.functions.get(key)?;
        Some(LocalCapability::new(
            capability,
            key.clone(),
            tracked.mode,
            tracked.core.clone(),
            Arc::clone(&tracked.function),
        ))
    }

    /// Declarations of live wrapped functions, one per function name
    ///
    /// When a name was wrapped more than once the newest declaration wins.
    pub fn declared_tools(&self) -> Vec<ToolSpec> {
        let book = self.inner.book.read();
        book.newest()
            .into_values()
            .filter_map(|key| book.functions.get(key))
            .map(|tracked| tracked.tool.as_ref().clone())
            .collect()
    }

    /// Names of live functions that declared `capability`
    pub fn functions_depending_on(&self, capability: &str) -> Vec<String> {
        let book = self.inner.book.read();
        let names: BTreeSet<String> = book
            .dependents
            .get(capability)
            .map(|keys| keys.iter().map(|k| k.name().to_string()).collect())
            .unwrap_or_default();
        names.into_iter().collect()
    }

    fn dependent_count(&self, capability: &str) -> usize {
        self.inner
            .book
            .read()
            .dependents
            .get(capability)
            .map_or(0, BTreeSet::len)
    }

    /// Number of live wrapped functions
    pub fn function_count(&self) -> usize {
        self.inner.book.read().functions.len()
    }
}

impl Default for DependencyInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DependencyInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyInjector")
            .field("functions", &self.function_count())
            .field("registry", &self.inner.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capability, RemoteCapability};
    use crate::declaration::DependencySpec;
    use crate::injection::{CallMode, Injectable, Overrides};
    use std::any::Any;

    #[derive(Debug)]
    struct FixedDate(&'static str);

    impl Capability for FixedDate {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn greet_tool() -> ToolSpec {
        ToolSpec::new("greet").depends_on(DependencySpec::new("date_service"))
    }

    fn greet(injector: &DependencyInjector) -> BlockingInjectable<&'static str, String> {
        injector.create_injection_wrapper(greet_tool(), |name: &'static str, deps: &Dependencies| {
            match deps.get_as::<FixedDate>("date_service") {
                Some(date) => format!("{}:{}", name, date.0),
                None => format!("{}:unavailable", name),
            }
        })
    }

    #[test]
    fn test_greet_example() {
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

    #[test]
    fn test_explicit_none_override_wins() {
        let injector = DependencyInjector::new();
        injector.register_dependency("date_service", Arc::new(FixedDate("2024-01-20")));
        let greet = greet(&injector);

        assert_eq!(
            greet.call_with("Dana", Overrides::none().without("date_service")),
            "Dana:unavailable"
        );
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let injector = DependencyInjector::new();
        injector.register_dependency("date_service", Arc::new(FixedDate("x")));
        assert!(injector.unregister_dependency("date_service"));
        assert!(!injector.unregister_dependency("date_service"));
        assert!(!injector.unregister_dependency("never_registered"));
    }

    #[test]
    fn test_last_write_wins() {
        let injector = DependencyInjector::new();
        let greet = greet(&injector);
        injector.register_dependency("date_service", Arc::new(FixedDate("first")));
        injector.register_dependency("date_service", Arc::new(FixedDate("second")));
        assert_eq!(greet.call("Eve"), "Eve:second");
    }

    #[test]
    fn test_function_scope_overrides_process_wide() {
        let injector = DependencyInjector::new();
        let greet = greet(&injector);
        injector.register_dependency("date_service", Arc::new(FixedDate("global")));
        injector.register_dependency_for("greet", "date_service", Arc::new(FixedDate("scoped")));
        assert_eq!(greet.call("Finn"), "Finn:scoped");

        injector.unregister_dependency_for("greet", "date_service");
        assert_eq!(greet.call("Finn"), "Finn:global");
    }

    #[test]
    fn test_bookkeeping_released_with_last_handle() {
        let injector = DependencyInjector::new();
        let greet = greet(&injector);
        let second_handle = greet.clone();
        injector.register_dependency_for(
            "greet",
            "date_service",
            Arc::new(RemoteCapability::new("date_service", "a", "http://a", "today")),
        );

        assert_eq!(injector.function_count(), 1);
        assert_eq!(injector.functions_depending_on("date_service"), vec!["greet"]);

        drop(greet);
        assert_eq!(injector.function_count(), 1);

        drop(second_handle);
        assert_eq!(injector.function_count(), 0);
        assert!(injector.functions_depending_on("date_service").is_empty());
        assert!(injector.resolve("greet", "date_service").is_none());
    }

    #[test]
    fn test_declared_tools_tracks_live_wrappers() {
        let injector = DependencyInjector::new();
        let greet = greet(&injector);
        let report = injector.create_injection_wrapper(ToolSpec::new("report"), |_: (), _: &Dependencies| 0u8);

        let names: Vec<_> = injector
            .declared_tools()
            .iter()
            .map(|t| t.function_name().to_string())
            .collect();
        assert_eq!(names, vec!["greet", "report"]);

        drop(report);
        assert_eq!(injector.declared_tools().len(), 1);
        assert_eq!(greet.call_mode(), CallMode::Blocking);
        assert_eq!(greet.dependencies().len(), 1);
    }

    #[test]
    fn test_wrapper_outliving_injector_keeps_registry() {
        let greet = {
            let injector = DependencyInjector::new();
            injector.register_dependency("date_service", Arc::new(FixedDate("2024-01-20")));
            greet(&injector)
        };
        assert_eq!(greet.call("Gus"), "Gus:2024-01-20");
    }

    #[test]
    fn test_generation_moves_on_wrap_and_release() {
        let injector = DependencyInjector::new();
        let start = injector.generation();

        let greet = greet(&injector);
        let wrapped = injector.generation();
        assert_ne!(wrapped, start);

        // Registry writes alone do not count
        injector.register_dependency("date_service", Arc::new(FixedDate("x")));
        assert_eq!(injector.generation(), wrapped);

        drop(greet);
        assert_ne!(injector.generation(), wrapped);
    }

    #[test]
    fn test_local_capability_calls_live_wrapper() {
        let injector = DependencyInjector::new();
        injector.register_dependency("date_service", Arc::new(FixedDate("2024-01-20")));
        let greet = greet(&injector);

        let local = injector.local_capability("greeting", "greet").unwrap();
        assert_eq!(local.key(), greet.key());
        assert_eq!(local.call_mode(), CallMode::Blocking);

        let direct = local.blocking::<&'static str, String>().unwrap();
        assert_eq!(direct.call("Hal"), "Hal:2024-01-20");
        assert!(local.blocking::<u64, String>().is_none());
        assert!(local.awaitable::<&'static str, String>().is_none());
        assert!(injector.local_capability("greeting", "missing").is_none());

        drop(direct);
        drop(greet);
        assert!(!local.is_live());
        assert!(local.blocking::<&'static str, String>().is_none());
    }

    #[tokio::test]
    async fn test_awaitable_wrapper() {
        let injector = DependencyInjector::new();
        injector.register_dependency("date_service", Arc::new(FixedDate("2024-01-20")));
        let greet = injector.create_async_injection_wrapper(
            greet_tool(),
            |name: String, deps: Dependencies| async move {
                let date = deps
                    .get_as::<FixedDate>("date_service")
                    .map_or("unavailable", |d| d.0);
                format!("{}:{}", name, date)
            },
        );

        assert_eq!(greet.call("Alice".to_string()).await, "Alice:2024-01-20");
        assert_eq!(greet.call_mode(), CallMode::Awaitable);

        injector.unregister_dependency("date_service");
        assert_eq!(greet.call("Carl".to_string()).await, "Carl:unavailable");
    }
}
