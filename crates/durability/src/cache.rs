//! Owned byte cache for whole-file legacy reads.
//!
//! Legacy streams are read by loading the entire file and decoding from the
//! slice. Repeated reads of the same symbol's file are served from this
//! cache. The cache has a byte budget and evicts least recently used files
//! first; a file larger than the whole budget is never cached.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tickstore_core::{StoreError, StoreResult, SymbolKey};
use tracing::debug;

/// Default cache budget (64 MiB)
pub const DEFAULT_CACHE_BUDGET: usize = 64 * 1024 * 1024;

#[derive(Debug)]
struct Entry {
    path: PathBuf,
    data: Arc<[u8]>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<SymbolKey, Entry>,
    bytes: usize,
    clock: u64,
}

/// Cache of file contents keyed by symbol.
#[derive(Debug)]
pub struct FileCache {
    budget: usize,
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from memory
    pub hits: u64,
    /// Reads that went to disk
    pub misses: u64,
    /// Files currently cached
    pub entries: usize,
    /// Bytes currently cached
    pub bytes: usize,
}

impl FileCache {
    /// Create a cache holding at most `budget` bytes
    pub fn new(budget: usize) -> Self {
        FileCache {
            budget,
            inner: Mutex::new(Inner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Byte budget
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Contents of `path`, loaded from disk on a miss.
    pub fn get_or_load(&self, key: SymbolKey, path: &Path) -> StoreResult<Arc<[u8]>> {
        {
            let mut inner = self.inner.lock();
            inner.clock += 1;
            let now = inner.clock;
            if let Some(entry) = inner.entries.get_mut(&key) {
                if entry.path == path {
                    entry.last_used = now;
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Arc::clone(&entry.data));
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let data: Arc<[u8]> = match std::fs::read(path) {
            Ok(bytes) => bytes.into(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::FileNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        self.insert(key, path, Arc::clone(&data));
        Ok(data)
    }

    /// Drop the cached contents of `key`, if any.
    pub fn invalidate(&self, key: SymbolKey) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.remove(&key) {
            inner.bytes -= entry.data.len();
        }
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: inner.entries.len(),
            bytes: inner.bytes,
        }
    }

    fn insert(&self, key: SymbolKey, path: &Path, data: Arc<[u8]>) {
        if data.len() > self.budget {
            return;
        }
        let mut inner = self.inner.lock();
        if let Some(old) = inner.entries.remove(&key) {
            inner.bytes -= old.data.len();
        }
        while inner.bytes + data.len() > self.budget {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| *key);
            let Some(oldest) = oldest else { break };
            if let Some(evicted) = inner.entries.remove(&oldest) {
                inner.bytes -= evicted.data.len();
                debug!(target: "tickstore::cache", symbol = %oldest, bytes = evicted.data.len(), "Evicted");
            }
        }
        inner.clock += 1;
        let last_used = inner.clock;
        inner.bytes += data.len();
        inner.entries.insert(
            key,
            Entry {
                path: path.to_path_buf(),
                data,
                last_used,
            },
        );
    }
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_BUDGET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, len: usize) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![0xAB; len]).unwrap();
        path
    }

    #[test]
    fn test_hit_after_miss() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.tck", 100);
        let cache = FileCache::new(1_000);

        let first = cache.get_or_load(SymbolKey(1), &path).unwrap();
        let second = cache.get_or_load(SymbolKey(1), &path).unwrap();
        assert_eq!(first.len(), 100);
        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.bytes), (1, 1, 100));
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.tck", 400);
        let b = write(&dir, "b.tck", 400);
        let c = write(&dir, "c.tck", 400);
        let cache = FileCache::new(1_000);

        cache.get_or_load(SymbolKey(1), &a).unwrap();
        cache.get_or_load(SymbolKey(2), &b).unwrap();
        cache.get_or_load(SymbolKey(1), &a).unwrap();
        cache.get_or_load(SymbolKey(3), &c).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert!(stats.bytes <= 1_000);
        // Symbol 2 was the least recently used
        cache.get_or_load(SymbolKey(1), &a).unwrap();
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_oversized_file_not_cached() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "big.tck", 2_000);
        let cache = FileCache::new(1_000);
        assert_eq!(cache.get_or_load(SymbolKey(1), &path).unwrap().len(), 2_000);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_invalidate_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.tck", 10);
        let cache = FileCache::new(1_000);
        cache.get_or_load(SymbolKey(1), &path).unwrap();
        cache.invalidate(SymbolKey(1));
        assert_eq!(cache.stats().bytes, 0);

        let missing = dir.path().join("missing.tck");
        assert!(matches!(
            cache.get_or_load(SymbolKey(9), &missing),
            Err(StoreError::FileNotFound(_))
        ));
    }
}
