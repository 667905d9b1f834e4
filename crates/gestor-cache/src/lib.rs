//! Compiled template artifact store.
//!
//! This crate provides the [`ArtifactStore`] trait that decouples the template
//! compiler from where compiled artifacts are persisted. Each artifact is an
//! opaque text blob addressed by a cache key (a hash chosen by the caller),
//! with a modification time used for staleness checks.
//!
//! # Implementations
//!
//! - [`FileArtifactStore`]: One file per key, written atomically
//!   (write-to-temp-then-rename), with version validation
//! - [`MemoryArtifactStore`]: In-process map, used by tests and embedders
//!
//! # Example
//!
//! ```
//! use gestor_cache::{ArtifactStore, MemoryArtifactStore};
//!
//! let store = MemoryArtifactStore::new();
//! store.write("0cc175b9", "compiled body").unwrap();
//! assert_eq!(store.read("0cc175b9").unwrap(), "compiled body");
//! assert!(store.mtime("0cc175b9").is_some());
//! ```

mod file;
mod memory;

use std::path::PathBuf;

pub use file::FileArtifactStore;
pub use memory::MemoryArtifactStore;

/// Artifact store error.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No artifact stored under the key.
    #[error("Compiled artifact not found: {0}")]
    NotFound(String),

    /// Storage I/O failed.
    #[error("Artifact I/O error at {}: {source}", .path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Key-value persistence for compiled artifacts.
///
/// Writers must be atomic from a reader's perspective: a concurrent
/// [`read`](ArtifactStore::read) observes either the previous artifact or the
/// new one, never a partial write.
pub trait ArtifactStore: Send + Sync {
    /// Modification time (seconds since Unix epoch) of the artifact, or
    /// `None` if no artifact is stored under `key`.
    fn mtime(&self, key: &str) -> Option<f64>;

    /// Read the full artifact text.
    fn read(&self, key: &str) -> Result<String, CacheError>;

    /// Atomically create or replace the artifact.
    ///
    /// The stored artifact's modification time is the time of the write.
    fn write(&self, key: &str, text: &str) -> Result<(), CacheError>;

    /// Human-readable location of the artifact (e.g. its file path).
    fn location(&self, key: &str) -> String;

    /// Remove every artifact, returning how many were removed.
    fn clear(&self) -> Result<usize, CacheError>;
}
