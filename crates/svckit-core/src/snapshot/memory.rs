// # Memory Snapshot Store
//
// In-memory implementation of SnapshotStore.
//
// Snapshots live only as long as the process. Useful for tests and for
// processes that only need failover between watch iterations, not across
// restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::snapshot_store::{Snapshot, SnapshotStore};

/// In-memory snapshot store
///
/// # Example
///
/// ```rust,no_run
/// use svckit_core::snapshot::{MemorySnapshotStore, Snapshot, SnapshotStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemorySnapshotStore::new();
///     store.save("app.json+DEFAULT_GROUP", &Snapshot::new("{}", "99914b932bd37a50b983c5e7c90ae93b")).await?;
///
///     let snapshot = store.load("app.json+DEFAULT_GROUP").await?;
///     assert_eq!(snapshot.map(|s| s.content), Some("{}".to_string()));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    inner: Arc<RwLock<HashMap<String, Snapshot>>>,
}

impl MemorySnapshotStore {
    /// Create a new empty memory snapshot store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored snapshots
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self, key: &str) -> Result<Option<Snapshot>, Error> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, snapshot: &Snapshot) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .insert(key.to_string(), snapshot.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.inner.write().await.remove(key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        Ok(self.inner.read().await.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}
