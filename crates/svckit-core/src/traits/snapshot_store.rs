// # Snapshot Store Trait
//
// Defines the interface for keeping local copies of remote configuration.
//
// ## Purpose
//
// A config source writes every successfully fetched blob to a snapshot
// store. When the server is unreachable, the last snapshot can be served
// instead, so a process can still start with the configuration it last saw.
//
// ## Implementations
//
// - Memory: `MemorySnapshotStore`
// - File: `FileSnapshotStore` (atomic writes, backup recovery)

use async_trait::async_trait;

/// A stored copy of a configuration blob
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    /// The content
    pub content: String,
    /// Lowercase hex MD5 of `content`, as reported by the source
    pub md5: String,
    /// Timestamp the snapshot was saved
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

impl Snapshot {
    /// Create a snapshot stamped with the current time
    pub fn new(content: impl Into<String>, md5: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            md5: md5.into(),
            saved_at: chrono::Utc::now(),
        }
    }
}

/// Build the key a config blob is stored under
///
/// Keys follow the `dataId+group+tenant` layout; the tenant part is
/// omitted for the public namespace.
pub fn snapshot_key(data_id: &str, group: &str, tenant: &str) -> String {
    if tenant.is_empty() {
        format!("{}+{}", data_id, group)
    } else {
        format!("{}+{}+{}", data_id, group, tenant)
    }
}

/// Trait for snapshot store implementations
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the snapshot stored under `key`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Snapshot))`: The stored snapshot
    /// - `Ok(None)`: Nothing stored under `key`
    /// - `Err(Error)`: Storage error
    async fn load(&self, key: &str) -> Result<Option<Snapshot>, crate::Error>;

    /// Store a snapshot under `key`, replacing any previous one
    async fn save(&self, key: &str, snapshot: &Snapshot) -> Result<(), crate::Error>;

    /// Remove the snapshot stored under `key` (no error if absent)
    async fn remove(&self, key: &str) -> Result<(), crate::Error>;

    /// List all stored keys
    async fn list(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
