// # Service Registry Trait
//
// Defines the interface for registering service instances with a registry.
//
// ## Implementations
//
// - Consul: `svckit-consul` crate
//
// ## Usage
//
// ```rust,ignore
// use svckit_core::{RegistrationConfig, ServiceRegistry};
// use svckit_core::traits::ServiceInstance;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let registry = /* ServiceRegistry implementation */;
//
//     let instance = ServiceInstance::from_config(&config);
//     registry.register(&instance).await?;
//
//     // ... serve traffic ...
//
//     registry.deregister(&instance.id).await?;
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::config::RegistrationConfig;

/// HTTP health check attached to a registered instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    /// URL the registry polls
    pub http: String,
    /// Poll interval (in seconds)
    pub interval_secs: u64,
    /// Poll timeout (in seconds)
    pub timeout_secs: u64,
    /// Deregister after the check stays critical this long (in seconds, 0 = never)
    pub deregister_critical_service_after_secs: u64,
}

/// A service instance as submitted to a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    /// Unique instance id
    pub id: String,
    /// Service name
    pub name: String,
    /// Instance address
    pub address: String,
    /// Instance port
    pub port: u16,
    /// Service tags
    pub tags: Vec<String>,
    /// Health check
    pub check: HealthCheck,
}

impl ServiceInstance {
    /// Build an instance from a registration config
    ///
    /// A fresh UUID v4 is generated as the instance id on every call.
    pub fn from_config(config: &RegistrationConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: config.name.clone(),
            address: config.project.host.clone(),
            port: config.project.port,
            tags: config.tags.clone(),
            check: HealthCheck {
                http: config.health_check_url(),
                interval_secs: config.interval_secs,
                timeout_secs: config.timeout_secs,
                deregister_critical_service_after_secs: config
                    .deregister_critical_service_after_secs,
            },
        }
    }
}

/// Trait for service registry implementations
///
/// Implementations are single-shot: one API call per method, no retries,
/// no background tasks. Errors are returned to the caller.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Register (or re-register) an instance
    async fn register(&self, instance: &ServiceInstance) -> Result<(), crate::Error>;

    /// Remove an instance from the registry
    ///
    /// Deregistering an unknown id is not an error for registries that
    /// treat removal as idempotent.
    async fn deregister(&self, service_id: &str) -> Result<(), crate::Error>;

    /// Get the registry name (for logging/debugging)
    fn registry_name(&self) -> &'static str;
}

/// Helper trait for constructing service registries from configuration
pub trait ServiceRegistryFactory: Send + Sync {
    /// Create a ServiceRegistry instance from configuration
    fn create(
        &self,
        config: &crate::config::RegistryConfig,
    ) -> Result<Box<dyn ServiceRegistry>, crate::Error>;
}
