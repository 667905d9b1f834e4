//! File-based artifact store.
//!
//! [`FileArtifactStore`] keeps one file per cache key inside a single
//! directory:
//!
//! ```text
//! {root}/
//! +-- VERSION                 # engine version that produced the artifacts
//! +-- 0b9c2625dc21ef05.compiled
//! +-- 3f2a...compiled
//! ```
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the target, so readers never observe a half-written artifact.
//!
//! On construction, [`FileArtifactStore`] validates the `VERSION` file in the
//! root. If the version mismatches or is missing, every `*.compiled` file is
//! removed and `VERSION` rewritten; other files in the directory are left
//! alone. Artifacts produced by a different engine build are never used.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tempfile::NamedTempFile;

use crate::{ArtifactStore, CacheError};

/// Extension of artifact files.
const ARTIFACT_EXTENSION: &str = "compiled";

/// File-based [`ArtifactStore`] rooted at a directory on disk.
#[derive(Debug)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Create a store at `root`, validating the engine version.
    ///
    /// The directory is created if it does not exist. Errors during
    /// validation are logged but never fatal; a broken directory surfaces as
    /// an error on the first [`write`](ArtifactStore::write).
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        validate_version(&root, version);
        Self { root }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of the artifact stored under `key`.
    #[must_use]
    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{ARTIFACT_EXTENSION}"))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn mtime(&self, key: &str) -> Option<f64> {
        let modified = fs::metadata(self.path(key)).ok()?.modified().ok()?;
        Some(
            modified
                .duration_since(UNIX_EPOCH)
                .map_or(0.0, |d| d.as_secs_f64()),
        )
    }

    fn read(&self, key: &str) -> Result<String, CacheError> {
        let path = self.path(key);
        fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CacheError::NotFound(key.to_owned())
            } else {
                CacheError::io(path, e)
            }
        })
    }

    fn write(&self, key: &str, text: &str) -> Result<(), CacheError> {
        let path = self.path(key);

        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| CacheError::io(&self.root, e))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| CacheError::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| CacheError::io(&path, e.error))?;

        tracing::debug!(path = %path.display(), bytes = text.len(), "artifact written");
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        self.path(key).display().to_string()
    }

    fn clear(&self) -> Result<usize, CacheError> {
        let removed = remove_artifacts(&self.root)?;
        tracing::info!(removed, root = %self.root.display(), "artifact cache cleared");
        Ok(removed)
    }
}

/// Delete every artifact file under `root`, returning how many were removed.
fn remove_artifacts(root: &Path) -> Result<usize, CacheError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(CacheError::io(root, e)),
    };

    let mut removed = 0;
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == ARTIFACT_EXTENSION) && path.is_file() {
            fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Validate the cache version, removing stale artifacts on mismatch.
fn validate_version(root: &Path, version: &str) {
    let version_file = root.join("VERSION");

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("artifact cache version matches: {version}");
            return;
        }
        Ok(stored) => {
            tracing::info!(
                "artifact cache version mismatch (stored={stored}, current={version}), wiping cache"
            );
        }
        Err(_) => {
            tracing::info!("no artifact cache VERSION file found, initializing cache");
        }
    }

    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!("failed to create artifact cache directory: {e}");
        return;
    }
    match remove_artifacts(root) {
        Ok(removed) => tracing::debug!(removed, "stale artifacts removed"),
        Err(e) => tracing::warn!("failed to remove stale artifacts: {e}"),
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!("failed to write artifact cache VERSION file: {e}");
    }
}
