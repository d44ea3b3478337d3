// # svckit-core
//
// Core library for the svckit vendor integrations.
//
// ## Architecture Overview
//
// This library provides the shared building blocks used by every vendor crate:
// - **ServiceRegistry**: Trait for registering service instances (Consul)
// - **ConfigSource**: Trait for fetching and watching remote config (Nacos)
// - **ObjectStore** / **CredentialIssuer**: Traits for object storage (COS, STS)
// - **SmsSender**: Trait for templated SMS delivery
// - **ConfigWatcher**: Drives a ConfigSource and keeps a decoded value current
// - **SnapshotStore**: Local copies of remote config for failover
// - **IntegrationRegistry**: Factory registry for registries and config sources
//
// ## Design Principles
//
// 1. **Thin Wrappers**: Each integration applies defaults and forwards one call
// 2. **Library-First**: Everything the daemon does is available as a library
// 3. **Plugin-Based**: Integrations are registered by name, no hard-coded if-else
// 4. **Secrets Stay Quiet**: Keys and tokens never reach logs or Debug output

pub mod traits;
pub mod watcher;
pub mod registry;
pub mod config;
pub mod error;
pub mod snapshot;

// Re-export core types for convenience
pub use traits::{ConfigSource, CredentialIssuer, ObjectStore, ServiceRegistry, SmsSender};
pub use watcher::{ConfigHandle, ConfigWatcher, WatchEvent};
pub use registry::IntegrationRegistry;
pub use config::{Endpoint, NacosConfig, RegistrationConfig};
pub use error::{Error, Result};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
