//! Empresa CRUD pages.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Form};
use gestor_template::{CSRF_TOKEN_KEY, RenderContext};

use crate::empresa::{EmpresaData, is_unique_violation};
use crate::error::ServerError;
use crate::handlers::{not_found, redirect, spoofed_method, view};
use crate::session::SessionHandle;
use crate::state::AppState;
use crate::validation::Validator;

/// Validation rules of the Empresa form.
const RULES: [(&str, &str); 3] = [
    ("nome", "required|max:191"),
    ("cnpj", "required|max:18"),
    ("email", "required|email|max:191"),
];

const DUPLICATE: &str = "Já existe uma empresa com este CNPJ ou e-mail.";

type FormData = HashMap<String, String>;

fn submitted_token(form: &FormData) -> Option<&str> {
    form.get(CSRF_TOKEN_KEY).map(String::as_str)
}

/// Context re-rendering a form after failed validation.
fn invalid_form(validator: &Validator, form: &FormData) -> Result<RenderContext, ServerError> {
    Ok(RenderContext::new()
        .with("errors", serde_json::to_value(validator.errors())?)
        .with("old", serde_json::to_value(form)?))
}

/// Handle GET /empresas.
pub(crate) async fn index(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Response, ServerError> {
    let empresas = state.empresas.all().await?;

    let mut ctx = RenderContext::new().with("empresas", serde_json::to_value(&empresas)?);
    if let Some(message) = session.take_flash() {
        ctx.insert("flash", message);
    }
    Ok(view(&state, &session, "empresa.index", ctx)?.into_response())
}

/// Handle GET /empresas/create.
pub(crate) async fn create(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Response, ServerError> {
    Ok(view(&state, &session, "empresa.create", RenderContext::new())?.into_response())
}

/// Handle POST /empresas.
pub(crate) async fn store(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Form(form): Form<FormData>,
) -> Result<Response, ServerError> {
    session.verify_csrf(submitted_token(&form))?;

    let validator = Validator::validate(&form, &RULES);
    if validator.fails() {
        let ctx = invalid_form(&validator, &form)?;
        return Ok(view(&state, &session, "empresa.create", ctx)?.into_response());
    }

    match state.empresas.create(&EmpresaData::from_form(&form)).await {
        Ok(empresa) => {
            tracing::info!(id = empresa.id, nome = %empresa.nome, "created empresa");
            session.flash("Empresa cadastrada com sucesso.");
            Ok(redirect(&state, "/empresas").into_response())
        }
        Err(e) if is_unique_violation(&e) => Err(ServerError::Conflict(DUPLICATE.to_owned())),
        Err(e) => Err(e.into()),
    }
}

/// Handle GET /empresas/edit/{id}.
pub(crate) async fn edit(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<i64>,
) -> Result<Response, ServerError> {
    let Some(empresa) = state.empresas.find(id).await? else {
        return Ok(not_found(&state, &session));
    };

    let ctx = RenderContext::new().with("empresa", serde_json::to_value(&empresa)?);
    Ok(view(&state, &session, "empresa.edit", ctx)?.into_response())
}

/// Handle POST /empresas/{id} with `_method=PUT` (or `PATCH`).
pub(crate) async fn update(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<i64>,
    Form(form): Form<FormData>,
) -> Result<Response, ServerError> {
    spoofed_method(&form, &[Method::PUT, Method::PATCH])?;
    session.verify_csrf(submitted_token(&form))?;

    let Some(empresa) = state.empresas.find(id).await? else {
        return Ok(not_found(&state, &session));
    };

    let validator = Validator::validate(&form, &RULES);
    if validator.fails() {
        let ctx = invalid_form(&validator, &form)?.with("empresa", serde_json::to_value(&empresa)?);
        return Ok(view(&state, &session, "empresa.edit", ctx)?.into_response());
    }

    match state.empresas.update(id, &EmpresaData::from_form(&form)).await {
        Ok(_) => {
            tracing::info!(id, "updated empresa");
            session.flash("Empresa atualizada com sucesso.");
            Ok(redirect(&state, "/empresas").into_response())
        }
        Err(e) if is_unique_violation(&e) => Err(ServerError::Conflict(DUPLICATE.to_owned())),
        Err(e) => Err(e.into()),
    }
}

/// Handle POST /empresas/delete/{id} with `_method=DELETE`.
pub(crate) async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<i64>,
    Form(form): Form<FormData>,
) -> Result<Response, ServerError> {
    spoofed_method(&form, &[Method::DELETE])?;
    session.verify_csrf(submitted_token(&form))?;

    if state.empresas.delete(id).await? {
        tracing::info!(id, "deleted empresa");
        session.flash("Empresa excluída com sucesso.");
    }
    Ok(redirect(&state, "/empresas").into_response())
}
