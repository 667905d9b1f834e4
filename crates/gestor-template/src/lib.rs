//! Directive template engine for Gestor views.
//!
//! Templates use a small directive language:
//!
//! | Directive | Meaning |
//! |---|---|
//! | `@extends("layout.name")` | declare the parent layout |
//! | `@section("name") ... @endsection` | define a named content block |
//! | `@yield("name")` | substitution point in a layout |
//! | `@include("view.name")` | splice another view |
//! | `{{ expr }}` | HTML-escaped interpolation |
//! | `@if(expr)` / `@elseif(expr)` / `@else` / `@endif` | conditional |
//! | `@foreach($items as $item)` / `@endforeach` | iteration |
//! | `@csrf` | hidden CSRF token input, resolved at render time |
//!
//! Views are compiled once into artifacts kept in an
//! [`ArtifactStore`](gestor_cache::ArtifactStore) and recompiled when their
//! source changes. Compiled artifacts are evaluated against a
//! [`RenderContext`] of JSON values.
//!
//! # Architecture
//!
//! - [`ViewName`]: dotted view identifier, mapped to a source path and a cache key
//! - directive compiler: ordered text passes turning directives into artifact instructions
//! - layout resolver: `@extends` / `@section` / `@yield` inheritance, include cycle detection
//! - render executor: evaluates artifacts with an expression interpreter
//! - [`TemplateEngine`]: staleness checks, per-view single-flight compilation, rendering
//!
//! # Example
//!
//! ```ignore
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! use gestor_cache::FileArtifactStore;
//! use gestor_storage::FsViewSource;
//! use gestor_template::{NoSession, RenderContext, TemplateEngine, ENGINE_VERSION};
//!
//! let engine = TemplateEngine::new(
//!     Arc::new(FsViewSource::new(PathBuf::from("views"))),
//!     Arc::new(FileArtifactStore::new(PathBuf::from("storage/cache/views"), ENGINE_VERSION)),
//! );
//! let html = engine.render("empresa.index", &RenderContext::new(), &NoSession)?;
//! ```

mod artifact;
mod context;
mod directive;
mod engine;
mod error;
mod expr;
mod locks;
mod name;
mod render;
mod resolver;
mod value;

pub use context::{NoSession, RenderContext, Session};
pub use engine::{CompileReport, EngineStats, TemplateEngine};
pub use error::TemplateError;
pub use name::ViewName;
pub use render::CSRF_TOKEN_KEY;
pub use value::escape_html;

/// Version stamp for artifact stores. Artifacts written by another engine
/// version are discarded.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
