// # File Snapshot Store
//
// File-based implementation of SnapshotStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good file
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "snapshots": {
//     "app.json+DEFAULT_GROUP": {
//       "content": "{\"feature\":true}",
//       "md5": "5f1b6a...",
//       "saved_at": "2026-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::snapshot_store::{Snapshot, SnapshotStore};

/// Snapshot file format version
const SNAPSHOT_FILE_VERSION: &str = "1.0";

/// File name used when a directory is given instead of a file
const SNAPSHOT_FILE_NAME: &str = "snapshots.json";

/// File-based snapshot store with crash recovery
#[derive(Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    snapshots: HashMap<String, Snapshot>,
    dirty: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct SnapshotFileFormat {
    version: String,
    snapshots: HashMap<String, Snapshot>,
}

/// Why a snapshot file could not be loaded
enum LoadFailure {
    /// The file exists but is not valid UTF-8 JSON in our format
    Corrupt(Error),
    /// The file could not be read at all
    Unreadable(Error),
}

impl FileSnapshotStore {
    /// Create or load a file snapshot store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing file
    /// 3. If corruption is detected, try to load the backup
    /// 4. If both fail, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create snapshot directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let snapshots = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                snapshots,
                dirty: false,
            })),
        })
    }

    /// Create or load the store file inside a cache directory
    pub async fn in_dir<P: AsRef<Path>>(dir: P) -> Result<Self, Error> {
        Self::new(dir.as_ref().join(SNAPSHOT_FILE_NAME)).await
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, Snapshot>, Error> {
        match Self::load_file(path).await {
            Ok(snapshots) => {
                tracing::debug!("Loaded {} snapshot(s) from {}", snapshots.len(), path.display());
                Ok(snapshots)
            }
            Err(LoadFailure::Unreadable(e)) => Err(e),
            Err(LoadFailure::Corrupt(e)) => {
                tracing::warn!(
                    "Snapshot file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No snapshot backup found. Starting empty.");
                    return Ok(HashMap::new());
                }

                match Self::load_file(&backup_path).await {
                    Ok(snapshots) => {
                        tracing::info!("Recovered {} snapshot(s) from backup", snapshots.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore snapshot file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(snapshots)
                    }
                    Err(LoadFailure::Corrupt(backup_err))
                    | Err(LoadFailure::Unreadable(backup_err)) => {
                        tracing::error!(
                            "Snapshot backup also unusable: {}. Starting empty.",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
        }
    }

    async fn load_file(path: &Path) -> Result<HashMap<String, Snapshot>, LoadFailure> {
        if !path.exists() {
            tracing::debug!("Snapshot file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read(path).await.map_err(|e| {
            LoadFailure::Unreadable(Error::snapshot(format!(
                "Failed to read snapshot file {}: {}",
                path.display(),
                e
            )))
        })?;

        // Invalid UTF-8 surfaces here as a parse error
        let file: SnapshotFileFormat = serde_json::from_slice(&content).map_err(|e| {
            LoadFailure::Corrupt(Error::snapshot(format!(
                "Failed to parse snapshot file {}: {}",
                path.display(),
                e
            )))
        })?;

        if file.version != SNAPSHOT_FILE_VERSION {
            tracing::warn!(
                "Snapshot file version mismatch: expected {}, got {}. Loading anyway.",
                SNAPSHOT_FILE_VERSION,
                file.version
            );
        }

        Ok(file.snapshots)
    }

    /// Write the file atomically (temp file, backup, rename)
    async fn write_file(&self) -> Result<(), Error> {
        let state_guard = self.state.read().await;

        let file = SnapshotFileFormat {
            version: SNAPSHOT_FILE_VERSION.to_string(),
            snapshots: state_guard.snapshots.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::snapshot(format!("Failed to serialize snapshots: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut temp = fs::File::create(&temp_path).await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.write_all(json.as_bytes()).await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            temp.flush().await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create snapshot backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::snapshot(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        drop(state_guard);
        self.state.write().await.dirty = false;

        tracing::trace!("Snapshots written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, key: &str) -> Result<Option<Snapshot>, Error> {
        Ok(self.state.read().await.snapshots.get(key).cloned())
    }

    async fn save(&self, key: &str, snapshot: &Snapshot) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            if state_guard.snapshots.get(key).map(|s| &s.md5) == Some(&snapshot.md5) {
                return Ok(());
            }
            state_guard.snapshots.insert(key.to_string(), snapshot.clone());
            state_guard.dirty = true;
        }

        self.write_file().await
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        {
            let mut state_guard = self.state.write().await;
            if state_guard.snapshots.remove(key).is_none() {
                return Ok(());
            }
            state_guard.dirty = true;
        }

        self.write_file().await
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        Ok(self.state.read().await.snapshots.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write_file().await } else { Ok(()) }
    }
}
