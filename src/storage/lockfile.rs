//! Store Lock
//!
//! Decision memory assumes one writer process per store file. `StoreLock`
//! claims `<store>.lock` beside the store with an exclusive create, so a
//! second `petroagent` process on the same store fails fast instead of
//! silently losing updates. Stores in the same directory do not contend.
//!
//! The lock body records who holds it:
//!
//! ```json
//! { "pid": 4242, "store": "data/workover_memory.json", "acquired_at": "2025-03-01T09:30:00Z" }
//! ```

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Contents of a lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockOwner {
    pub pid: u32,
    pub store: PathBuf,
    pub acquired_at: DateTime<Utc>,
}

/// Exclusive claim on one decision store, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    held: bool,
}

impl StoreLock {
    /// Claim the store at `store_path`.
    ///
    /// A lock left by a dead process, by this process, or with an unreadable
    /// body is reclaimed. A lock held by another live `petroagent` is an error.
    pub fn acquire<P: AsRef<Path>>(store_path: P) -> Result<Self> {
        let store_path = store_path.as_ref();
        let path = lock_path_for(store_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory {}", parent.display()))?;
        }

        let owner = LockOwner {
            pid: std::process::id(),
            store: store_path.to_path_buf(),
            acquired_at: Utc::now(),
        };
        let body = serde_json::to_vec(&owner).context("Failed to encode lock owner")?;

        // Second attempt only happens after a stale lock was removed.
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&body)
                        .and_then(|()| file.sync_all())
                        .with_context(|| format!("Failed to write lock file {}", path.display()))?;
                    debug!(pid = owner.pid, lock = %path.display(), "Acquired store lock");
                    return Ok(Self { path, held: true });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    Self::reclaim(&path, store_path)?;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create lock file {}", path.display()))
                }
            }
        }
        bail!("Could not claim store lock {}", path.display())
    }

    /// Remove an existing lock unless a live peer holds it.
    fn reclaim(path: &Path, store_path: &Path) -> Result<()> {
        match read_owner(path) {
            Some(owner) if owner.pid != std::process::id() && holder_alive(owner.pid) => {
                bail!(
                    "Decision store {} is in use by another petroagent (PID {}, since {})\n\
                     If that process is gone, delete {}",
                    store_path.display(),
                    owner.pid,
                    owner.acquired_at.to_rfc3339(),
                    path.display()
                );
            }
            Some(owner) => info!(pid = owner.pid, lock = %path.display(), "Reclaiming stale store lock"),
            None => warn!(lock = %path.display(), "Unreadable store lock, reclaiming"),
        }

        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove stale lock {}", path.display())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock early. Also runs on drop.
    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(lock = %self.path.display(), "Released store lock"),
            Err(e) => warn!(lock = %self.path.display(), error = %e, "Failed to remove store lock"),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// `data/workover_memory.json` locks as `data/workover_memory.json.lock`.
pub fn lock_path_for(store_path: &Path) -> PathBuf {
    let mut name = store_path
        .file_name()
        .map_or_else(|| OsString::from("store"), OsString::from);
    name.push(".lock");
    store_path.with_file_name(name)
}

fn read_owner(path: &Path) -> Option<LockOwner> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(unix)]
fn holder_alive(pid: u32) -> bool {
    // PID must exist and still be a petroagent
    fs::read_to_string(format!("/proc/{pid}/cmdline"))
        .map(|cmdline| cmdline.contains("petroagent"))
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn holder_alive(_pid: u32) -> bool {
    true
}
