//! Decision Storage
//!
//! - `DecisionMemory`: JSON-file decision cache with read-time expiry
//! - `StoreLock`: guards one store file against a second writer process

pub mod lockfile;
pub mod memory;

pub use lockfile::{LockOwner, StoreLock};
pub use memory::{CacheRecord, DecisionMemory, MemoryStats};

use std::path::PathBuf;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {}: {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Decision memory lock poisoned")]
    Poisoned,
}
