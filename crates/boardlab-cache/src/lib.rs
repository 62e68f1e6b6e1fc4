//! File-backed memoization of toolchain and registry results.
//!
//! One JSON file per key under the hidden project cache directory. Reads
//! honor a freshness window against the file's modification time; every
//! cache I/O failure degrades to a miss so an operation never fails because
//! of the cache. Failed toolchain results are never written.
//!
//! There is no locking: concurrent writers to the same key race at the
//! filesystem level with last-write-wins semantics.

use log::{debug, info, warn};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Default freshness window, in days.
pub const MAX_AGE_DEFAULT: u64 = 1;

const SECONDS_PER_DAY: u64 = 86_400;

/// Content-derived cache key for one operation + argument list.
///
/// Equal inputs always produce equal keys; distinct normal-size inputs are
/// expected (not guaranteed) to produce distinct keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    operation: String,
    digest: String,
}

impl CacheKey {
    pub fn new(operation: &str, args: &[&str]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(operation.as_bytes());
        for arg in args {
            hasher.update(b"_");
            hasher.update(arg.as_bytes());
        }
        Self {
            operation: operation.to_string(),
            digest: hex::encode(hasher.finalize()),
        }
    }

    /// File name of this entry inside the cache directory.
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.operation, self.digest)
    }
}

/// The on-disk result cache.
#[derive(Debug)]
pub struct CommandCache {
    dir: PathBuf,
}

impl CommandCache {
    /// A cache rooted at the given directory (created lazily on first
    /// write).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the stored payload when the entry exists and is younger than
    /// `max_age_days`. Stale entries and any read/parse failure count as a
    /// miss.
    pub fn load(&self, key: &CacheKey, max_age_days: u64) -> Option<Value> {
        let file = self.dir.join(key.file_name());

        let age = match entry_age_seconds(&file) {
            Some(age) => age,
            None => return None,
        };
        if age >= max_age_days * SECONDS_PER_DAY {
            debug!("cache entry {} is stale ({}s old)", key.file_name(), age);
            return None;
        }

        let content = match std::fs::read_to_string(&file) {
            Ok(content) => content,
            Err(err) => {
                warn!("failed to read cache entry {:?}: {}", file, err);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => {
                debug!("cache hit for {}", key.file_name());
                Some(value)
            }
            Err(err) => {
                warn!("failed to parse cache entry {:?}: {}", file, err);
                None
            }
        }
    }

    /// Persists a payload, unless it represents a failed toolchain result
    /// (`"status": false`), which must never be served from cache.
    pub fn store(&self, key: &CacheKey, payload: &Value) {
        if payload.get("status").and_then(Value::as_bool) == Some(false) {
            debug!("not caching failed result for {}", key.file_name());
            return;
        }

        if let Err(err) = std::fs::create_dir_all(&self.dir) {
            warn!("failed to create cache directory {:?}: {}", self.dir, err);
            return;
        }
        let file = self.dir.join(key.file_name());
        match serde_json::to_string_pretty(payload) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&file, json) {
                    warn!("failed to write cache entry {:?}: {}", file, err);
                }
            }
            Err(err) => warn!("failed to serialize cache entry {:?}: {}", file, err),
        }
    }

    /// Removes every entry unconditionally.
    ///
    /// Invoked whenever the package/release index is refreshed, since all
    /// index-derived entries become stale simultaneously.
    pub fn clear(&self) {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => info!("cleared cache at {:?}", self.dir),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("failed to clear cache {:?}: {}", self.dir, err),
        }
    }
}

fn entry_age_seconds(file: &Path) -> Option<u64> {
    let modified = std::fs::metadata(file).ok()?.modified().ok()?;
    match SystemTime::now().duration_since(modified) {
        Ok(age) => Some(age.as_secs()),
        // Clock skew: a file from the future is as fresh as it gets.
        Err(_) => Some(0),
    }
}
