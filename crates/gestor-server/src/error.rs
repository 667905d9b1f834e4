//! Error types for the HTTP server.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use gestor_template::{TemplateError, escape_html};

/// Status sent when the CSRF token of a form does not match the session.
pub(crate) const PAGE_EXPIRED: u16 = 419;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// No route or record matches the request.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The `_method` field does not name a method the route accepts.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// The form's `_token` does not match the session token.
    #[error("CSRF token mismatch")]
    CsrfMismatch,

    /// A unique column already holds the submitted value.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// View compilation or rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Database query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// View data could not be serialized.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::CsrfMismatch => {
                StatusCode::from_u16(PAGE_EXPIRED).unwrap_or(StatusCode::FORBIDDEN)
            }
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Template(_) | Self::Database(_) | Self::Serialize(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Página não encontrada",
            Self::MethodNotAllowed(_) => "Método não permitido",
            Self::CsrfMismatch => "Página expirada",
            Self::Conflict(_) => "Registro duplicado",
            Self::Template(_) | Self::Database(_) | Self::Serialize(_) | Self::Io(_) => "Erro interno",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }

        let body = format!(
            "<!DOCTYPE html>\n<html lang=\"pt-br\">\n<head><meta charset=\"UTF-8\"><title>{code} {title}</title></head>\n\
             <body>\n<h1>{code} {title}</h1>\n<p>{message}</p>\n</body>\n</html>\n",
            code = status.as_u16(),
            title = self.title(),
            message = escape_html(&self.to_string()),
        );

        (status, Html(body)).into_response()
    }
}
