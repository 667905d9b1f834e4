//! Dotted logical view names.

use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};

use crate::TemplateError;

/// Validated dotted view identifier such as `empresa.index`.
///
/// A name maps deterministically to:
/// - a source path, dots replaced by `/` (`empresa/index`), which the
///   [`ViewSource`](gestor_storage::ViewSource) completes with its extension
/// - a cache key, the MD5 hex digest of the dotted name
///
/// Each segment may contain ASCII letters, digits, `_` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewName(String);

impl ViewName {
    /// Parse a dotted view name.
    pub fn new(name: impl Into<String>) -> Result<Self, TemplateError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.split('.').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            });

        if valid {
            Ok(Self(name))
        } else {
            Err(TemplateError::InvalidViewName(name))
        }
    }

    /// Build a view name from a source path (`empresa/index` -> `empresa.index`).
    ///
    /// Paths whose segments contain dots cannot round-trip and are rejected.
    pub fn from_source_path(path: &str) -> Result<Self, TemplateError> {
        if path.contains('.') {
            return Err(TemplateError::InvalidViewName(path.to_owned()));
        }
        Self::new(path.replace('/', "."))
    }

    /// The dotted name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Source path relative to the views directory, without extension.
    #[must_use]
    pub fn source_path(&self) -> String {
        self.0.replace('.', "/")
    }

    /// Stable cache key for the compiled artifact.
    #[must_use]
    pub fn cache_key(&self) -> String {
        hex::encode(Md5::digest(self.0.as_bytes()))
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ViewName {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ViewName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
