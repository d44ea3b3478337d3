//! Test doubles shared by the svckit-core contract tests

#![allow(dead_code)]

use svckit_core::error::Result;
use svckit_core::traits::{ConfigChangeEvent, ConfigSource, ServiceInstance, ServiceRegistry};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// A ConfigSource whose change stream is fed by the test
pub struct ControlledConfigSource {
    initial: String,
    watcher_rx: Arc<std::sync::Mutex<Option<mpsc::UnboundedReceiver<ConfigChangeEvent>>>>,
}

impl ControlledConfigSource {
    pub fn new(initial: impl Into<String>) -> (Self, mpsc::UnboundedSender<ConfigChangeEvent>) {
        let (test_tx, watcher_rx) = mpsc::unbounded_channel();

        let source = Self {
            initial: initial.into(),
            watcher_rx: Arc::new(std::sync::Mutex::new(Some(watcher_rx))),
        };

        (source, test_tx)
    }
}

#[async_trait::async_trait]
impl ConfigSource for ControlledConfigSource {
    async fn fetch(&self) -> Result<String> {
        Ok(self.initial.clone())
    }

    fn watch(&self) -> Pin<Box<dyn Stream<Item = ConfigChangeEvent> + Send + 'static>> {
        let rx = self
            .watcher_rx
            .lock()
            .unwrap()
            .take()
            .expect("watch() can only be called once");

        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }

    fn source_name(&self) -> &'static str {
        "controlled"
    }
}

/// A ConfigSource that never reports a change
pub struct IdleConfigSource {
    content: String,
}

impl IdleConfigSource {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[async_trait::async_trait]
impl ConfigSource for IdleConfigSource {
    async fn fetch(&self) -> Result<String> {
        Ok(self.content.clone())
    }

    fn watch(&self) -> Pin<Box<dyn Stream<Item = ConfigChangeEvent> + Send + 'static>> {
        Box::pin(tokio_stream::pending::<ConfigChangeEvent>())
    }

    fn source_name(&self) -> &'static str {
        "idle"
    }
}

/// A ServiceRegistry that records every call
#[derive(Default)]
pub struct MockServiceRegistry {
    registered: Arc<std::sync::Mutex<Vec<ServiceInstance>>>,
    deregistered: Arc<std::sync::Mutex<Vec<String>>>,
}

impl MockServiceRegistry {
    /// A registry recording into the same call lists as `other`
    pub fn sharing_calls_with(other: &Self) -> Self {
        Self {
            registered: Arc::clone(&other.registered),
            deregistered: Arc::clone(&other.deregistered),
        }
    }

    pub fn registered(&self) -> Vec<ServiceInstance> {
        self.registered.lock().unwrap().clone()
    }

    pub fn deregistered(&self) -> Vec<String> {
        self.deregistered.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ServiceRegistry for MockServiceRegistry {
    async fn register(&self, instance: &ServiceInstance) -> Result<()> {
        self.registered.lock().unwrap().push(instance.clone());
        Ok(())
    }

    async fn deregister(&self, service_id: &str) -> Result<()> {
        self.deregistered.lock().unwrap().push(service_id.to_string());
        Ok(())
    }

    fn registry_name(&self) -> &'static str {
        "mock"
    }
}

/// Build a change event for `data_id` in the default group
pub fn change(data_id: &str, content: &str, md5: &str) -> ConfigChangeEvent {
    ConfigChangeEvent {
        data_id: data_id.to_string(),
        group: "DEFAULT_GROUP".to_string(),
        tenant: String::new(),
        content: content.to_string(),
        md5: md5.to_string(),
    }
}

/// Sample decoded configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default)]
    pub replicas: u32,
}
