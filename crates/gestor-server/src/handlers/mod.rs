//! HTTP request handlers.

pub(crate) mod empresas;
pub(crate) mod home;

use std::collections::HashMap;
use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use gestor_template::RenderContext;

use crate::error::ServerError;
use crate::session::SessionHandle;
use crate::state::AppState;

/// Form field carrying the spoofed HTTP method.
const METHOD_FIELD: &str = "_method";

/// Render `name` with `ctx` plus the variables every view receives.
pub(crate) fn view(
    state: &AppState,
    session: &SessionHandle,
    name: &str,
    ctx: RenderContext,
) -> Result<Html<String>, ServerError> {
    let ctx = ctx
        .with("basePath", state.base_path.as_str())
        .with("appName", state.app_name.as_str());
    Ok(Html(state.engine.render(name, &ctx, session)?))
}

/// Redirect to an application path, prefixed with the base path.
pub(crate) fn redirect(state: &AppState, path: &str) -> Redirect {
    Redirect::to(&format!("{}{path}", state.base_path))
}

/// The `errors.404` page with status 404.
pub(crate) fn not_found(state: &AppState, session: &SessionHandle) -> Response {
    match view(state, session, "errors.404", RenderContext::new()) {
        Ok(html) => (StatusCode::NOT_FOUND, html).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "cannot render 404 page");
            ServerError::NotFound("page".to_owned()).into_response()
        }
    }
}

/// Handle requests no route matches.
pub(crate) async fn fallback(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Response {
    not_found(&state, &session)
}

/// Check the method a POST form spoofs through `_method`.
///
/// Only `PUT`, `PATCH` and `DELETE` can be spoofed, and only those listed in
/// `accepted` are allowed for the route.
pub(crate) fn spoofed_method(
    form: &HashMap<String, String>,
    accepted: &[Method],
) -> Result<Method, ServerError> {
    let raw = form
        .get(METHOD_FIELD)
        .map(|m| m.trim().to_ascii_uppercase())
        .unwrap_or_default();

    Method::from_bytes(raw.as_bytes())
        .ok()
        .filter(|m| [Method::PUT, Method::PATCH, Method::DELETE].contains(m))
        .filter(|m| accepted.contains(m))
        .ok_or_else(|| {
            ServerError::MethodNotAllowed(if raw.is_empty() { "POST".to_owned() } else { raw })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(method: Option<&str>) -> HashMap<String, String> {
        method
            .map(|m| HashMap::from([(METHOD_FIELD.to_owned(), m.to_owned())]))
            .unwrap_or_default()
    }

    #[test]
    fn test_spoofed_method() {
        let update = [Method::PUT, Method::PATCH];

        assert_eq!(spoofed_method(&form(Some("PUT")), &update).unwrap(), Method::PUT);
        assert_eq!(spoofed_method(&form(Some("patch")), &update).unwrap(), Method::PATCH);
        assert_eq!(
            spoofed_method(&form(Some("DELETE")), &[Method::DELETE]).unwrap(),
            Method::DELETE
        );
    }

    #[test]
    fn test_spoofed_method_rejections() {
        let update = [Method::PUT, Method::PATCH];

        for method in [None, Some(""), Some("DELETE"), Some("GET"), Some("bogus method")] {
            assert!(
                matches!(spoofed_method(&form(method), &update), Err(ServerError::MethodNotAllowed(_))),
                "{method:?} should be rejected"
            );
        }
    }
}
