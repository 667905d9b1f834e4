//! Template engine errors.

use gestor_cache::CacheError;
use gestor_storage::StorageError;

/// Error produced while compiling or rendering a view.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The view's source does not exist.
    #[error("View [{0}] not found")]
    ViewNotFound(String),

    /// A view extends a layout whose source does not exist.
    #[error("Layout [{layout}] not found (extended by view [{view}])")]
    LayoutNotFound {
        /// View declaring the `@extends`.
        view: String,
        /// Missing layout name.
        layout: String,
    },

    /// A view was reached again while it was still being compiled or rendered.
    #[error("Circular compilation detected in view [{view}] ({})", .chain.join(" -> "))]
    CircularCompilation {
        /// View that closed the cycle.
        view: String,
        /// Views on the stack when the cycle was detected, outermost first.
        chain: Vec<String>,
    },

    /// A view name is empty or contains characters that cannot map to a path.
    #[error("Invalid view name: {0:?}")]
    InvalidViewName(String),

    /// A render context binding uses a name reserved by the engine.
    #[error("Variable ${0} is reserved by the template engine")]
    ReservedBinding(String),

    /// Malformed compiled output (unbalanced blocks, bad expressions).
    #[error("Syntax error in view [{view}]: {message}")]
    Syntax {
        /// View being compiled.
        view: String,
        /// Description of the problem.
        message: String,
    },

    /// An expression failed at render time.
    #[error("Error rendering view [{view}]: {message}")]
    Eval {
        /// View being rendered.
        view: String,
        /// Description of the problem.
        message: String,
    },

    /// Reading a template source failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Reading or writing a compiled artifact failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl TemplateError {
    pub(crate) fn syntax(view: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            view: view.into(),
            message: message.into(),
        }
    }

    pub(crate) fn eval(view: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Eval {
            view: view.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for errors caused by a missing view or layout.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ViewNotFound(_) | Self::LayoutNotFound { .. })
    }
}
