//! Application state.
//!
//! Shared state for all request handlers.

use std::sync::Arc;

use gestor_template::TemplateEngine;

use crate::empresa::EmpresaRepository;
use crate::session::SessionStore;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// View engine.
    pub(crate) engine: Arc<TemplateEngine>,
    /// Empresa queries.
    pub(crate) empresas: EmpresaRepository,
    /// Live sessions.
    pub(crate) sessions: Arc<SessionStore>,
    /// URL prefix prepended to links and redirects.
    pub(crate) base_path: String,
    /// Display name passed to every view.
    pub(crate) app_name: String,
}
