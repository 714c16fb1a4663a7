//! Decision Memory - time-bounded cache of final decisions
//!
//! One JSON object on disk, keyed by well id:
//!
//! ```json
//! { "B2": { "timestamp": "2025-01-03T09:12:44Z", "well_id": "B2", "data": { ... } } }
//! ```
//!
//! Expiry is decided at read time. Stale records stay on disk until the
//! same well is saved again.
//!
//! If the store file cannot be parsed on open, the memory starts empty and
//! the next save overwrites the file. Losing cached decisions is preferred
//! over refusing to start: every decision can be recomputed.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::StorageError;
use crate::types::WorkoverCandidate;

/// Persisted wrapper around one decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Creation time, ISO-8601. A record without one is never served.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub well_id: String,
    /// Serialized `WorkoverCandidate`. Decoded lazily on recall.
    #[serde(default)]
    pub data: Value,
}

/// Snapshot of memory contents for dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Records on disk, stale ones included
    pub record_count: usize,
    /// Records still inside the retention window
    pub live_record_count: usize,
    pub retention_days: i64,
    /// Time of the most recent recall, if any
    pub last_query_time: Option<DateTime<Utc>>,
}

/// File-backed decision cache with read-time expiry.
#[derive(Debug)]
pub struct DecisionMemory {
    path: PathBuf,
    retention_days: i64,
    records: RwLock<BTreeMap<String, CacheRecord>>,
    last_query: RwLock<Option<DateTime<Utc>>>,
}

impl DecisionMemory {
    /// Open (or create) the store at `path`.
    ///
    /// The parent directory is created when missing. A corrupt file is
    /// logged and treated as an empty store.
    pub fn open<P: AsRef<Path>>(path: P, retention_days: i64) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::Io(parent.to_path_buf(), e))?;
        }

        let records = load_records(&path)?;
        info!(
            path = %path.display(),
            records = records.len(),
            retention_days,
            "Decision memory opened"
        );

        Ok(Self {
            path,
            retention_days,
            records: RwLock::new(records),
            last_query: RwLock::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retention_days(&self) -> i64 {
        self.retention_days
    }

    /// Most recent unexpired decision for `well_id`.
    pub fn recall(&self, well_id: &str) -> Option<WorkoverCandidate> {
        self.recall_at(well_id, Utc::now())
    }

    /// `recall` evaluated against an explicit clock.
    pub fn recall_at(&self, well_id: &str, now: DateTime<Utc>) -> Option<WorkoverCandidate> {
        *self.last_query.write().unwrap_or_else(PoisonError::into_inner) = Some(now);

        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let record = records.get(well_id)?;

        let Some(raw_ts) = record.timestamp.as_deref() else {
            debug!(well_id, "Record has no timestamp, treating as absent");
            return None;
        };
        let Some(stored_at) = parse_timestamp(raw_ts) else {
            warn!(well_id, timestamp = raw_ts, "Unparseable record timestamp, treating as absent");
            return None;
        };

        if is_expired(stored_at, self.retention_days, now) {
            info!(well_id, stored_at = %stored_at, "♻️ Record expired, re-analysis required");
            return None;
        }

        match serde_json::from_value::<WorkoverCandidate>(record.data.clone()) {
            Ok(decision) => {
                info!(well_id, source = %decision.source, "⚡ Cache hit");
                Some(decision)
            }
            Err(e) => {
                warn!(well_id, error = %e, "Stored decision no longer decodes, treating as absent");
                None
            }
        }
    }

    /// Unconditional upsert, durable before returning.
    pub fn save(&self, well_id: &str, decision: &WorkoverCandidate) -> Result<(), StorageError> {
        self.save_at(well_id, decision, Utc::now())
    }

    /// `save` with an explicit creation timestamp.
    pub fn save_at(
        &self,
        well_id: &str,
        decision: &WorkoverCandidate,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let record = CacheRecord {
            timestamp: Some(now.to_rfc3339()),
            well_id: well_id.to_string(),
            data: serde_json::to_value(decision)?,
        };

        let mut records = self.records.write().map_err(|_| StorageError::Poisoned)?;
        let previous = records.insert(well_id.to_string(), record);

        if let Err(e) = write_records(&self.path, &records) {
            // Keep memory and disk in agreement: the save was not acknowledged.
            match previous {
                Some(prev) => records.insert(well_id.to_string(), prev),
                None => records.remove(well_id),
            };
            return Err(e);
        }

        info!(
            well_id,
            job_type = %decision.proposed_job_type,
            source = %decision.source,
            "💾 Saved decision"
        );
        Ok(())
    }

    /// Aggregate statistics. Does not touch `last_query_time`.
    pub fn stats(&self) -> MemoryStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> MemoryStats {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let live_record_count = records
            .values()
            .filter_map(|r| r.timestamp.as_deref().and_then(parse_timestamp))
            .filter(|ts| !is_expired(*ts, self.retention_days, now))
            .count();

        MemoryStats {
            record_count: records.len(),
            live_record_count,
            retention_days: self.retention_days,
            last_query_time: *self.last_query.read().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// A window that runs past the end of representable time never expires.
fn is_expired(stored_at: DateTime<Utc>, retention_days: i64, now: DateTime<Utc>) -> bool {
    Duration::try_days(retention_days)
        .and_then(|window| stored_at.checked_add_signed(window))
        .is_some_and(|deadline| now > deadline)
}

/// Read RFC 3339, or a naive ISO-8601 stamp interpreted as local time.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}

fn load_records(path: &Path) -> Result<BTreeMap<String, CacheRecord>, StorageError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let bytes = fs::read(path).map_err(|e| StorageError::Io(path.to_path_buf(), e))?;
    let root: serde_json::Map<String, Value> = match serde_json::from_slice(&bytes) {
        Ok(root) => root,
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "⚠️ Decision store corrupted, starting with an empty memory"
            );
            return Ok(BTreeMap::new());
        }
    };

    let mut records = BTreeMap::new();
    for (well_id, value) in root {
        match serde_json::from_value::<CacheRecord>(value) {
            Ok(record) => {
                records.insert(well_id, record);
            }
            Err(e) => warn!(well_id = %well_id, error = %e, "Skipping malformed cache record"),
        }
    }
    Ok(records)
}

/// Write the whole store atomically: temp file, fsync, rename.
fn write_records(path: &Path, records: &BTreeMap<String, CacheRecord>) -> Result<(), StorageError> {
    let json = serde_json::to_vec_pretty(records)?;
    let tmp_path = path.with_extension("json.tmp");

    let mut file = File::create(&tmp_path).map_err(|e| StorageError::Io(tmp_path.clone(), e))?;
    file.write_all(&json)
        .map_err(|e| StorageError::Io(tmp_path.clone(), e))?;
    file.sync_all()
        .map_err(|e| StorageError::Io(tmp_path.clone(), e))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| StorageError::Io(path.to_path_buf(), e))?;

    #[cfg(unix)]
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
