//! Template source storage for the Gestor view engine.
//!
//! This crate provides a [`ViewSource`] trait that decouples the template
//! compiler from where template sources live. This enables:
//!
//! - **Unit testing** without touching the real filesystem
//! - **Clean separation** between compilation logic and I/O operations
//!
//! # Architecture
//!
//! The crate provides:
//! - [`ViewSource`] trait with `scan()`, `read()`, `exists()` and `mtime()` methods
//! - [`FsViewSource`] implementation reading templates from a views directory
//! - [`MockViewSource`] for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use std::path::PathBuf;
//! use gestor_storage::{FsViewSource, ViewSource};
//!
//! let source = FsViewSource::new(PathBuf::from("views"));
//! let text = source.read("empresa/index")?;
//! ```

mod fs;
#[cfg(feature = "mock")]
mod mock;
mod source;

pub use fs::FsViewSource;
#[cfg(feature = "mock")]
pub use mock::MockViewSource;
pub use source::{StorageError, StorageErrorKind, ViewSource};
