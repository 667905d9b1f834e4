//! Mock view source for testing.
//!
//! Provides [`MockViewSource`] for unit testing without filesystem access.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::source::{StorageError, ViewSource};

/// Backend identifier for error messages.
const BACKEND: &str = "Mock";

/// A template held in memory.
#[derive(Debug, Clone)]
struct MockView {
    content: String,
    mtime: f64,
}

/// Mock view source for testing.
///
/// Stores templates in memory. Use the builder methods to seed it, and
/// [`MockViewSource::set`] / [`MockViewSource::touch`] to simulate edits
/// while it is shared with an engine.
///
/// # Example
///
/// ```ignore
/// use gestor_storage::{MockViewSource, ViewSource};
///
/// let source = MockViewSource::new()
///     .with_view("home", "<h1>{{ $title }}</h1>");
///
/// assert!(source.exists("home"));
/// ```
#[derive(Debug, Default)]
pub struct MockViewSource {
    views: RwLock<BTreeMap<String, MockView>>,
}

impl MockViewSource {
    /// Create a new empty mock source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template with modification time `1.0`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_view(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.set(path, content, 1.0);
        self
    }

    /// Override the modification time of an existing template.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_mtime(self, path: &str, mtime: f64) -> Self {
        if let Some(view) = self.views.write().unwrap().get_mut(path) {
            view.mtime = mtime;
        }
        self
    }

    /// Insert or replace a template.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set(&self, path: impl Into<String>, content: impl Into<String>, mtime: f64) {
        self.views.write().unwrap().insert(
            path.into(),
            MockView {
                content: content.into(),
                mtime,
            },
        );
    }

    /// Bump a template's modification time without changing its content.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn touch(&self, path: &str, mtime: f64) {
        if let Some(view) = self.views.write().unwrap().get_mut(path) {
            view.mtime = mtime;
        }
    }

    /// Remove a template.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn remove(&self, path: &str) {
        self.views.write().unwrap().remove(path);
    }

    fn get(&self, path: &str) -> Result<MockView, StorageError> {
        self.views
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::not_found(path).with_backend(BACKEND))
    }
}

impl ViewSource for MockViewSource {
    fn scan(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.views.read().unwrap().keys().cloned().collect())
    }

    fn read(&self, path: &str) -> Result<String, StorageError> {
        self.get(path).map(|v| v.content)
    }

    fn exists(&self, path: &str) -> bool {
        self.views.read().unwrap().contains_key(path)
    }

    fn mtime(&self, path: &str) -> Result<f64, StorageError> {
        self.get(path).map(|v| v.mtime)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_new_empty() {
        let source = MockViewSource::new();

        assert!(source.scan().unwrap().is_empty());
        assert!(!source.exists("home"));
    }

    #[test]
    fn test_with_view() {
        let source = MockViewSource::new()
            .with_view("home", "Home")
            .with_view("empresa/index", "List");

        assert_eq!(source.read("home").unwrap(), "Home");
        assert_eq!(source.mtime("home").unwrap(), 1.0);
        assert_eq!(
            source.scan().unwrap(),
            vec!["empresa/index".to_owned(), "home".to_owned()]
        );
    }

    #[test]
    fn test_touch_and_set() {
        let source = MockViewSource::new().with_view("home", "v1").with_mtime("home", 5.0);
        assert_eq!(source.mtime("home").unwrap(), 5.0);

        source.touch("home", 10.0);
        assert_eq!(source.mtime("home").unwrap(), 10.0);
        assert_eq!(source.read("home").unwrap(), "v1");

        source.set("home", "v2", 20.0);
        assert_eq!(source.read("home").unwrap(), "v2");
    }

    #[test]
    fn test_missing_view_errors() {
        let source = MockViewSource::new();

        let err = source.read("missing").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.backend(), Some("Mock"));

        source.set("gone", "x", 1.0);
        source.remove("gone");
        assert!(source.mtime("gone").is_err());
    }
}
