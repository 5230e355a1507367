//! Registry of backend factories
//!
//! Backends are selected at configuration time by name. The registry maps that
//! name to a [`DbFactory`]; custom backends can be registered next to the
//! built-in ones.

use crate::{MemoryFactory, NullFactory, RedisFactory};
use phloem_core::{DbFactory, Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Backend factories keyed by name
pub struct BackendRegistry {
    factories: BTreeMap<&'static str, Arc<dyn DbFactory>>,
}

impl BackendRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self { factories: BTreeMap::new() }
    }

    /// A registry with `memory`, `null` and `redis`
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MemoryFactory::new()));
        registry.register(Arc::new(NullFactory));
        registry.register(Arc::new(RedisFactory));
        registry
    }

    /// Register a factory, replacing any existing one with the same name
    pub fn register(&mut self, factory: Arc<dyn DbFactory>) {
        self.factories.insert(factory.name(), factory);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DbFactory>> {
        self.factories.get(name)
    }

    /// Registered backend names, sorted
    pub fn backends(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Look up a factory, failing with a configuration error for unknown names
    pub fn factory(&self, name: &str) -> Result<Arc<dyn DbFactory>> {
        self.get(name).cloned().ok_or_else(|| {
            Error::Config(format!(
                "unknown backend '{name}'. Valid options: {}",
                self.backends().join(", ")
            ))
        })
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_builtin_backends() {
        let registry = BackendRegistry::with_builtin();

        assert!(registry.get("memory").is_some());
        assert!(registry.get("null").is_some());
        assert!(registry.get("redis").is_some());
        assert_eq!(registry.backends(), vec!["memory", "null", "redis"]);
    }

    #[test]
    fn test_registry_unknown_backend() {
        let registry = BackendRegistry::with_builtin();
        assert!(registry.get("tair").is_none());

        match registry.factory("tair") {
            Err(Error::Config(msg)) => {
                assert!(msg.contains("tair"));
                assert!(msg.contains("memory, null, redis"));
            }
            Err(other) => panic!("expected a config error, got {other}"),
            Ok(_) => panic!("expected a config error"),
        }
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = BackendRegistry::new();
        assert!(registry.backends().is_empty());

        registry.register(Arc::new(NullFactory));
        registry.register(Arc::new(NullFactory));
        assert_eq!(registry.backends(), vec!["null"]);
        assert_eq!(registry.factory("null").unwrap().name(), "null");
    }
}
