//! Plugin-based integration registry
//!
//! Vendor crates register factories under a type name; the daemon then
//! builds registries and config sources straight from configuration.
//!
//! ## Registration
//!
//! ```rust,ignore
//! // In the svckit-consul crate
//! pub fn register(registry: &IntegrationRegistry) {
//!     registry.register_registry("consul", Box::new(ConsulFactory));
//! }
//! ```

use crate::config::{ConfigSourceConfig, RegistryConfig};
use crate::error::{Error, Result};
use crate::traits::{ConfigSource, ConfigSourceFactory, ServiceRegistry, ServiceRegistryFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Name-keyed factories for service registries and config sources
///
/// Uses interior mutability, so registration works through a shared
/// reference.
#[derive(Default)]
pub struct IntegrationRegistry {
    registries: RwLock<HashMap<String, Box<dyn ServiceRegistryFactory>>>,
    config_sources: RwLock<HashMap<String, Arc<dyn ConfigSourceFactory>>>,
}

// A panic while holding one of these locks cannot leave a map half-written,
// so poisoned guards are taken over as-is.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl IntegrationRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service registry factory (e.g. "consul")
    pub fn register_registry(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ServiceRegistryFactory>,
    ) {
        write(&self.registries).insert(name.into(), factory);
    }

    /// Register a config source factory (e.g. "nacos")
    pub fn register_config_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ConfigSourceFactory>,
    ) {
        write(&self.config_sources).insert(name.into(), Arc::from(factory));
    }

    /// Create a service registry from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ServiceRegistry>)`: Created registry client
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_registry(&self, config: &RegistryConfig) -> Result<Box<dyn ServiceRegistry>> {
        let registry_type = config.type_name();
        let registries = read(&self.registries);

        let factory = registries
            .get(registry_type)
            .ok_or_else(|| Error::config(format!("Unknown registry type: {}", registry_type)))?;

        factory.create(config)
    }

    /// Create a config source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ConfigSource>)`: Created config source
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub async fn create_config_source(
        &self,
        config: &ConfigSourceConfig,
    ) -> Result<Box<dyn ConfigSource>> {
        let source_type = config.type_name();

        let factory = read(&self.config_sources)
            .get(source_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown config source type: {}", source_type)))?;

        // Guard is gone before the await
        factory.create(config).await
    }

    /// List all registered registry types
    pub fn list_registries(&self) -> Vec<String> {
        read(&self.registries).keys().cloned().collect()
    }

    /// List all registered config source types
    pub fn list_config_sources(&self) -> Vec<String> {
        read(&self.config_sources).keys().cloned().collect()
    }

    /// Check if a registry type is registered
    pub fn has_registry(&self, name: &str) -> bool {
        read(&self.registries).contains_key(name)
    }

    /// Check if a config source type is registered
    pub fn has_config_source(&self, name: &str) -> bool {
        read(&self.config_sources).contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Endpoint, RegistrationConfig};

    struct MockRegistryFactory;

    impl ServiceRegistryFactory for MockRegistryFactory {
        fn create(&self, _config: &RegistryConfig) -> Result<Box<dyn ServiceRegistry>> {
            Err(Error::not_found("Mock registry not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = IntegrationRegistry::new();
        assert!(!registry.has_registry("mock"));

        registry.register_registry("mock", Box::new(MockRegistryFactory));

        assert!(registry.has_registry("mock"));
        assert!(registry.list_registries().contains(&"mock".to_string()));
        assert!(registry.list_config_sources().is_empty());
    }

    #[test]
    fn test_unknown_registry_type() {
        let registry = IntegrationRegistry::new();
        let config = RegistryConfig::Consul(RegistrationConfig::new(
            "orders",
            Endpoint::new("127.0.0.1", 8500),
            Endpoint::new("10.0.0.5", 9000),
        ));

        match registry.create_registry(&config) {
            Err(Error::Config(msg)) => assert!(msg.contains("consul")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an unknown type error"),
        }
    }
}
