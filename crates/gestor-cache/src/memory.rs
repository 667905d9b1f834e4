//! In-memory artifact store.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{ArtifactStore, CacheError};

#[derive(Debug, Clone)]
struct Entry {
    text: String,
    mtime: f64,
}

/// [`ArtifactStore`] backed by a map in process memory.
///
/// Entries are replaced under a write lock, which makes every write atomic
/// for readers. The store counts writes so callers can observe how many
/// compilations were persisted.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: RwLock<HashMap<String, Entry>>,
    writes: AtomicUsize,
}

impl MemoryArtifactStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Acquire)
    }

    /// Number of stored artifacts.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Returns `true` if no artifact is stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

impl ArtifactStore for MemoryArtifactStore {
    fn mtime(&self, key: &str) -> Option<f64> {
        self.entries.read().unwrap().get(key).map(|e| e.mtime)
    }

    fn read(&self, key: &str) -> Result<String, CacheError> {
        self.entries
            .read()
            .unwrap()
            .get(key)
            .map(|e| e.text.clone())
            .ok_or_else(|| CacheError::NotFound(key.to_owned()))
    }

    fn write(&self, key: &str, text: &str) -> Result<(), CacheError> {
        let entry = Entry {
            text: text.to_owned(),
            mtime: now(),
        };
        self.entries.write().unwrap().insert(key.to_owned(), entry);
        self.writes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{key}")
    }

    fn clear(&self) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().unwrap();
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_write_read_and_count() {
        let store = MemoryArtifactStore::new();
        assert!(store.is_empty());

        store.write("k", "v1").unwrap();
        store.write("k", "v2").unwrap();

        assert_eq!(store.read("k").unwrap(), "v2");
        assert_eq!(store.writes(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.location("k"), "memory://k");
    }

    #[test]
    fn test_mtime_is_wall_clock() {
        let store = MemoryArtifactStore::new();
        let before = now();

        store.write("k", "v").unwrap();

        assert!(store.mtime("k").unwrap() >= before);
    }

    #[test]
    fn test_clear() {
        let store = MemoryArtifactStore::new();
        store.write("a", "1").unwrap();
        store.write("b", "2").unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert!(matches!(store.read("a"), Err(CacheError::NotFound(_))));
    }
}
