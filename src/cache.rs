//! Persisted content-hash cache.
//!
//! Maps root-relative paths to the digest recorded the last time the file was
//! analyzed. This is the single source of truth for "has this file changed
//! since the last scan". Stored as `dependency_cache.json` in the invocation
//! directory unless configured otherwise.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ScanError};
use crate::persist::write_json_atomic;

/// Default cache file name, relative to the invocation directory.
pub const DEFAULT_CACHE_FILE: &str = "dependency_cache.json";

/// On-disk record for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub hash: String,
}

/// Thread-safe change cache backed by a JSON file.
///
/// One mutex guards the whole mapping. Contention is bounded by file I/O in
/// the workers, so finer locking buys nothing.
#[derive(Debug)]
pub struct ChangeCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, CacheRecord>>,
}

impl ChangeCache {
    /// Create an empty cache that persists to `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Load the cache from `path`.
    ///
    /// A missing or unparsable file yields an empty cache; the next scan then
    /// runs cold instead of failing.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let entries = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, CacheRecord>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cache file is corrupt, starting cold");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cache file, starting cold");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read cache file, starting cold");
                BTreeMap::new()
            }
        };

        Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        }
    }

    /// Location this cache persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, CacheRecord>> {
        // A panicking worker cannot leave the map half-mutated: every
        // operation below is a single map call.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recorded digest for a path.
    pub fn lookup(&self, rel_path: &str) -> Option<String> {
        self.lock().get(rel_path).map(|r| r.hash.clone())
    }

    /// Whether the recorded digest for `rel_path` equals `digest`.
    pub fn is_current(&self, rel_path: &str, digest: &str) -> bool {
        self.lock()
            .get(rel_path)
            .is_some_and(|r| !r.hash.is_empty() && r.hash == digest)
    }

    /// Insert or replace the digest for a path.
    pub fn record(&self, rel_path: impl Into<String>, digest: impl Into<String>) {
        self.lock().insert(
            rel_path.into(),
            CacheRecord {
                hash: digest.into(),
            },
        );
    }

    /// Drop a path's entry, returning its digest if it existed.
    pub fn remove(&self, rel_path: &str) -> Option<String> {
        self.lock().remove(rel_path).map(|r| r.hash)
    }

    /// Move an entry to a new key, keeping its digest.
    ///
    /// Returns false if `old` had no entry.
    pub fn rename(&self, old: &str, new: impl Into<String>) -> bool {
        let mut entries = self.lock();
        match entries.remove(old) {
            Some(record) => {
                entries.insert(new.into(), record);
                true
            }
            None => false,
        }
    }

    /// All cached paths.
    pub fn paths(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Copy of the full mapping.
    pub fn snapshot(&self) -> BTreeMap<String, CacheRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Write the full mapping, replacing whatever was stored before.
    pub fn persist(&self) -> Result<()> {
        let snapshot = self.snapshot();
        let value = serde_json::to_value(&snapshot).map_err(|e| ScanError::json(&self.path, e))?;
        write_json_atomic(&self.path, &value)?;
        debug!(path = %self.path.display(), entries = snapshot.len(), "cache persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let cache = ChangeCache::load(temp.path().join("cache.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_corrupt_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();

        let cache = ChangeCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_record_lookup_remove() {
        let temp = TempDir::new().unwrap();
        let cache = ChangeCache::new(temp.path().join("cache.json"));

        cache.record("a.py", "abc");
        assert_eq!(cache.lookup("a.py"), Some("abc".to_string()));
        assert!(cache.is_current("a.py", "abc"));
        assert!(!cache.is_current("a.py", "def"));

        cache.record("a.py", "def");
        assert_eq!(cache.lookup("a.py"), Some("def".to_string()));

        assert_eq!(cache.remove("a.py"), Some("def".to_string()));
        assert_eq!(cache.lookup("a.py"), None);
    }

    #[test]
    fn test_empty_digest_never_current() {
        let temp = TempDir::new().unwrap();
        let cache = ChangeCache::new(temp.path().join("cache.json"));
        cache.record("a.py", "");
        assert!(!cache.is_current("a.py", ""));
    }

    #[test]
    fn test_rename_preserves_digest() {
        let temp = TempDir::new().unwrap();
        let cache = ChangeCache::new(temp.path().join("cache.json"));
        cache.record("foo.py", "h1");

        assert!(cache.rename("foo.py", "bar.py"));
        assert_eq!(cache.lookup("foo.py"), None);
        assert_eq!(cache.lookup("bar.py"), Some("h1".to_string()));
        assert!(!cache.rename("missing.py", "x.py"));
    }

    #[test]
    fn test_persist_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        let cache = ChangeCache::new(&path);
        cache.record("pkg/a.py", "h1");
        cache.record("pkg/b.rs", "h2");
        cache.persist().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["pkg/a.py"]["hash"], "h1");

        let reloaded = ChangeCache::load(&path);
        assert_eq!(reloaded.snapshot(), cache.snapshot());
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(ChangeCache::new(temp.path().join("cache.json")));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        cache.record(format!("t{t}/f{i}.py"), format!("{t}-{i}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cache.len(), 8 * 250);
        assert_eq!(cache.lookup("t3/f17.py"), Some("3-17".to_string()));
    }
}
