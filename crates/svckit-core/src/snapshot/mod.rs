// # Snapshot Store Implementations
//
// This module provides implementations of the SnapshotStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use crate::traits::snapshot_store::{Snapshot, SnapshotStore, snapshot_key};
pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;
