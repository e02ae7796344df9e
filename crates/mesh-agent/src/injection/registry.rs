// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Dependency registry
//!
//! Maps keys to the current resolved value. Writers swap the `Arc` for a
//! key under a short write lock; readers clone it under a read lock, so a
//! caller sees either the old value or the new one, never a mix.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::capability::CapabilityHandle;

/// Registry key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyKey {
    /// Process-wide value for a capability
    Capability(String),
    /// Value for a capability as seen by one function
    Scoped { function: String, capability: String },
}

impl DependencyKey {
    pub fn capability(name: impl Into<String>) -> Self {
        DependencyKey::Capability(name.into())
    }

    pub fn scoped(function: impl Into<String>, capability: impl Into<String>) -> Self {
        DependencyKey::Scoped {
            function: function.into(),
            capability: capability.into(),
        }
    }

    pub fn capability_name(&self) -> &str {
        match self {
            DependencyKey::Capability(name) => name,
            DependencyKey::Scoped { capability, .. } => capability,
        }
    }
}

/// Current resolved values, at most one per key
#[derive(Default)]
pub struct DependencyRegistry {
    entries: RwLock<HashMap<DependencyKey, CapabilityHandle>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, returning the value it replaced
    pub fn register(&self, key: DependencyKey, value: CapabilityHandle) -> Option<CapabilityHandle> {
        let previous = self.entries.write().insert(key.clone(), value);
        debug!(
            "[INJECT] {} {:?}",
            if previous.is_some() { "Replaced" } else { "Registered" },
            key
        );
        previous
    }

    /// Remove `key`. Removing an absent key is a no-op.
    pub fn unregister(&self, key: &DependencyKey) -> Option<CapabilityHandle> {
        let previous = self.entries.write().remove(key);
        if previous.is_some() {
            debug!("[INJECT] Unregistered {:?}", key);
        }
        previous
    }

    pub fn get(&self, key: &DependencyKey) -> Option<CapabilityHandle> {
        self.entries.read().get(key).cloned()
    }

    /// Value `function` should see for `capability`
    ///
    /// The function-scoped entry wins over the process-wide one. Both are
    /// read under one lock.
    pub fn lookup(&self, function: &str, capability: &str) -> Option<CapabilityHandle> {
        let entries = self.entries.read();
        entries
            .get(&DependencyKey::scoped(function, capability))
            .or_else(|| entries.get(&DependencyKey::capability(capability)))
            .cloned()
    }

    /// Drop every function-scoped entry of `function`
    pub fn remove_function(&self, function: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| {
            !matches!(key, DependencyKey::Scoped { function: f, .. } if f == function)
        });
        before - entries.len()
    }

    pub fn contains(&self, key: &DependencyKey) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<DependencyKey> {
        let mut keys: Vec<_> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::RemoteCapability;
    use std::sync::Arc;

    fn remote(agent: &str) -> CapabilityHandle {
        Arc::new(RemoteCapability::new("db", agent, "http://db:9000", "query"))
    }

    fn agent_of(handle: &CapabilityHandle) -> String {
        handle
            .downcast_ref::<RemoteCapability>()
            .map(|r| r.agent_id.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_scoped_entry_wins_over_process_wide() {
        let registry = DependencyRegistry::new();
        registry.register(DependencyKey::capability("db"), remote("global"));
        registry.register(DependencyKey::scoped("report", "db"), remote("scoped"));

        assert_eq!(agent_of(&registry.lookup("report", "db").unwrap()), "scoped");
        assert_eq!(agent_of(&registry.lookup("other", "db").unwrap()), "global");
        assert!(registry.lookup("report", "cache").is_none());
    }

    #[test]
    fn test_register_returns_previous() {
        let registry = DependencyRegistry::new();
        assert!(registry.register(DependencyKey::capability("db"), remote("a")).is_none());
        let old = registry.register(DependencyKey::capability("db"), remote("b"));
        assert_eq!(agent_of(&old.unwrap()), "a");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let registry = DependencyRegistry::new();
        assert!(registry.unregister(&DependencyKey::capability("db")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_function_only_touches_that_function() {
        let registry = DependencyRegistry::new();
        registry.register(DependencyKey::capability("db"), remote("g"));
        registry.register(DependencyKey::scoped("report", "db"), remote("r"));
        registry.register(DependencyKey::scoped("report", "cache"), remote("r"));
        registry.register(DependencyKey::scoped("export", "db"), remote("e"));

        assert_eq!(registry.remove_function("report"), 2);
        assert!(registry.contains(&DependencyKey::capability("db")));
        assert!(registry.contains(&DependencyKey::scoped("export", "db")));
    }
}
