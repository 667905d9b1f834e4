//! Home page.

use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::response::Html;
use gestor_template::RenderContext;

use crate::error::ServerError;
use crate::handlers::view;
use crate::session::SessionHandle;
use crate::state::AppState;

/// Handle GET /.
pub(crate) async fn index(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Html<String>, ServerError> {
    view(&state, &session, "home", RenderContext::new())
}
