//! Core traits for svckit
//!
//! This module defines the abstract interfaces the vendor crates implement.
//!
//! - [`ServiceRegistry`]: Register and deregister service instances
//! - [`ConfigSource`]: Fetch and watch a remote configuration blob
//! - [`ObjectStore`] / [`CredentialIssuer`]: Object uploads and temporary credentials
//! - [`SmsSender`]: Templated SMS delivery
//! - [`SnapshotStore`]: Local copies of remote configuration

pub mod service_registry;
pub mod config_source;
pub mod object_store;
pub mod sms_sender;
pub mod snapshot_store;

pub use service_registry::{HealthCheck, ServiceInstance, ServiceRegistry, ServiceRegistryFactory};
pub use config_source::{ConfigChangeEvent, ConfigSource, ConfigSourceFactory};
pub use object_store::{CredentialIssuer, ObjectStore, PutOptions, PutReceipt, TemporaryCredential};
pub use sms_sender::{MAX_PHONE_NUMBERS, SendReceipt, SendStatus, SmsMessage, SmsSender};
pub use snapshot_store::{Snapshot, SnapshotStore, snapshot_key};
