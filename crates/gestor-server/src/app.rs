//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, empresas, home};
use crate::middleware::security;
use crate::session;
use crate::state::AppState;

/// Create the application router.
///
/// Forms can only send GET and POST, so updates and deletes arrive as POST
/// with a `_method` field that the handlers check.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/", get(home::index))
        .route("/empresas", get(empresas::index).post(empresas::store))
        .route("/empresas/create", get(empresas::create))
        .route("/empresas/edit/{id}", get(empresas::edit))
        .route("/empresas/{id}", post(empresas::update))
        .route("/empresas/delete/{id}", post(empresas::destroy))
        .fallback(handlers::fallback);

    routes
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            session::middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(security::content_type_options_layer())
                .layer(security::frame_options_layer())
                .layer(security::referrer_policy_layer()),
        )
        .with_state(state)
}
