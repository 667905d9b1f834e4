//! Filesystem view source.
//!
//! Provides [`FsViewSource`] for reading templates from a views directory on
//! the local filesystem.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::source::{StorageError, StorageErrorKind, ViewSource};

/// Backend identifier for error messages.
const BACKEND: &str = "Fs";

/// Default template file extension.
const DEFAULT_EXTENSION: &str = "html";

/// Filesystem view source.
///
/// Maps view paths to files below `source_dir`: `"empresa/index"` becomes
/// `{source_dir}/empresa/index.{extension}`.
///
/// # Example
///
/// ```ignore
/// use std::path::PathBuf;
/// use gestor_storage::{FsViewSource, ViewSource};
///
/// let source = FsViewSource::new(PathBuf::from("views"));
/// assert!(source.exists("layouts/main"));
/// ```
#[derive(Debug, Clone)]
pub struct FsViewSource {
    /// Root directory for templates.
    source_dir: PathBuf,
    /// File extension without the leading dot.
    extension: String,
}

impl FsViewSource {
    /// Create a new filesystem view source using the `html` extension.
    #[must_use]
    pub fn new(source_dir: PathBuf) -> Self {
        Self::with_extension(source_dir, DEFAULT_EXTENSION)
    }

    /// Create a new filesystem view source with a custom file extension.
    ///
    /// # Arguments
    ///
    /// * `source_dir` - Root directory containing templates
    /// * `extension` - Extension without the leading dot (e.g. `"tpl"`)
    #[must_use]
    pub fn with_extension(source_dir: PathBuf, extension: &str) -> Self {
        Self {
            source_dir,
            extension: extension.trim_start_matches('.').to_owned(),
        }
    }

    /// Root directory for templates.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Map a view path to a file path, rejecting anything that could escape
    /// the source directory.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let valid = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !valid {
            return Err(StorageError::new(StorageErrorKind::InvalidPath)
                .with_path(relative)
                .with_backend(BACKEND));
        }

        let mut full = self.source_dir.join(relative);
        full.as_mut_os_string().push(".");
        full.as_mut_os_string().push(&self.extension);
        Ok(full)
    }

    /// Scan directory recursively and collect view paths.
    fn scan_directory(&self, dir_path: &Path, prefix: &str, views: &mut Vec<String>) {
        let Ok(entries) = fs::read_dir(dir_path) else {
            tracing::debug!(dir = %dir_path.display(), "skipping unreadable directory");
            return;
        };

        let mut entries: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|e| {
                let is_dir = e.file_type().is_ok_and(|t| t.is_dir());
                (e, is_dir)
            })
            .collect();
        entries.sort_by_key(|(e, _)| e.file_name());

        for (entry, is_dir) in entries {
            let name = entry.file_name().to_string_lossy().into_owned();

            // Skip hidden files/dirs
            if name.starts_with('.') {
                continue;
            }

            let path = entry.path();
            if is_dir {
                let nested = format!("{prefix}{name}/");
                self.scan_directory(&path, &nested, views);
            } else if path.extension().is_some_and(|e| e == self.extension.as_str())
                && let Some(stem) = path.file_stem()
            {
                views.push(format!("{prefix}{}", stem.to_string_lossy()));
            }
        }
    }
}

impl ViewSource for FsViewSource {
    fn scan(&self) -> Result<Vec<String>, StorageError> {
        if !self.source_dir.exists() {
            return Ok(Vec::new());
        }

        let mut views = Vec::new();
        self.scan_directory(&self.source_dir, "", &mut views);
        Ok(views)
    }

    fn read(&self, path: &str) -> Result<String, StorageError> {
        let full_path = self.resolve(path)?;
        fs::read_to_string(&full_path)
            .map_err(|e| StorageError::io(e, Some(full_path.clone())).with_backend(BACKEND))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.is_file())
    }

    fn mtime(&self, path: &str) -> Result<f64, StorageError> {
        let full_path = self.resolve(path)?;
        let metadata = fs::metadata(&full_path)
            .map_err(|e| StorageError::io(e, Some(full_path.clone())).with_backend(BACKEND))?;
        let modified = metadata
            .modified()
            .map_err(|e| StorageError::io(e, Some(full_path)).with_backend(BACKEND))?;
        Ok(modified
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_fs_view_source_is_send_sync() {
        assert_send_sync::<FsViewSource>();
    }

    fn create_test_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_read_existing_view() {
        let temp_dir = create_test_dir();
        fs::write(temp_dir.path().join("home.html"), "<h1>Home</h1>").unwrap();

        let source = FsViewSource::new(temp_dir.path().to_path_buf());

        assert_eq!(source.read("home").unwrap(), "<h1>Home</h1>");
    }

    #[test]
    fn test_read_nested_view() {
        let temp_dir = create_test_dir();
        fs::create_dir(temp_dir.path().join("empresa")).unwrap();
        fs::write(temp_dir.path().join("empresa/index.html"), "list").unwrap();

        let source = FsViewSource::new(temp_dir.path().to_path_buf());

        assert_eq!(source.read("empresa/index").unwrap(), "list");
    }

    #[test]
    fn test_read_missing_view() {
        let temp_dir = create_test_dir();
        let source = FsViewSource::new(temp_dir.path().to_path_buf());

        let err = source.read("missing").unwrap_err();

        assert_eq!(err.kind(), StorageErrorKind::NotFound);
        assert_eq!(err.backend(), Some("Fs"));
    }

    #[test]
    fn test_custom_extension() {
        let temp_dir = create_test_dir();
        fs::write(temp_dir.path().join("home.tpl"), "tpl").unwrap();
        fs::write(temp_dir.path().join("home.html"), "html").unwrap();

        let source = FsViewSource::with_extension(temp_dir.path().to_path_buf(), ".tpl");

        assert_eq!(source.read("home").unwrap(), "tpl");
    }

    #[test]
    fn test_exists() {
        let temp_dir = create_test_dir();
        fs::write(temp_dir.path().join("home.html"), "x").unwrap();
        fs::create_dir(temp_dir.path().join("partials")).unwrap();

        let source = FsViewSource::new(temp_dir.path().to_path_buf());

        assert!(source.exists("home"));
        assert!(!source.exists("missing"));
        // Directories are not templates
        assert!(!source.exists("partials"));
    }

    #[test]
    fn test_rejects_path_traversal() {
        let temp_dir = create_test_dir();
        let source = FsViewSource::new(temp_dir.path().join("views"));

        let err = source.read("../secret").unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::InvalidPath);

        let err = source.mtime("partials/../../secret").unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::InvalidPath);

        assert!(!source.exists("../secret"));
    }

    #[test]
    fn test_rejects_absolute_and_empty_paths() {
        let temp_dir = create_test_dir();
        let source = FsViewSource::new(temp_dir.path().to_path_buf());

        assert_eq!(
            source.read("/etc/passwd").unwrap_err().kind(),
            StorageErrorKind::InvalidPath
        );
        assert_eq!(source.read("").unwrap_err().kind(), StorageErrorKind::InvalidPath);
    }

    #[test]
    fn test_mtime_returns_modification_time() {
        let temp_dir = create_test_dir();
        fs::write(temp_dir.path().join("home.html"), "x").unwrap();

        let source = FsViewSource::new(temp_dir.path().to_path_buf());
        let mtime = source.mtime("home").unwrap();

        let now = std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs_f64();
        assert!(mtime > now - 60.0);
        assert!(mtime <= now + 1.0);
    }

    #[test]
    fn test_mtime_missing_view() {
        let temp_dir = create_test_dir();
        let source = FsViewSource::new(temp_dir.path().to_path_buf());

        let err = source.mtime("missing").unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn test_scan_lists_views_sorted() {
        let temp_dir = create_test_dir();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("empresa")).unwrap();
        fs::create_dir_all(root.join("layouts")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("home.html"), "").unwrap();
        fs::write(root.join("empresa/index.html"), "").unwrap();
        fs::write(root.join("empresa/create.html"), "").unwrap();
        fs::write(root.join("layouts/main.html"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();
        fs::write(root.join(".git/HEAD.html"), "").unwrap();

        let source = FsViewSource::new(root.to_path_buf());

        assert_eq!(
            source.scan().unwrap(),
            vec![
                "empresa/create".to_owned(),
                "empresa/index".to_owned(),
                "home".to_owned(),
                "layouts/main".to_owned(),
            ]
        );
    }

    #[test]
    fn test_scan_missing_dir() {
        let source = FsViewSource::new(PathBuf::from("/nonexistent/views"));

        assert!(source.scan().unwrap().is_empty());
    }
}
