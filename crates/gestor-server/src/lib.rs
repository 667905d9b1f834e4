//! HTTP server for the Gestor application.
//!
//! Serves the Empresa CRUD as server-rendered HTML pages, built on axum:
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /` | home page |
//! | `GET /empresas` | list |
//! | `GET /empresas/create` | new form |
//! | `POST /empresas` | create |
//! | `GET /empresas/edit/{id}` | edit form |
//! | `POST /empresas/{id}` + `_method=PUT` | update |
//! | `POST /empresas/delete/{id}` + `_method=DELETE` | delete |
//!
//! Every request gets a cookie session carrying a CSRF token. POST forms must
//! send it back as `_token` or are rejected with status 419.
//!
//! # Quick Start
//!
//! ```ignore
//! use gestor_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     run_server(ServerConfig::default()).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router (gestor-server)
//!                        │
//!                        ├─► session middleware ──► SessionStore (memory)
//!                        │
//!                        ├─► handlers ──► EmpresaRepository ──► SQLite (sqlx)
//!                        │       │
//!                        │       └─► TemplateEngine (gestor-template)
//!                        │
//!                        └─► security headers (tower-http)
//! ```

mod app;
mod empresa;
mod error;
mod handlers;
mod middleware;
mod session;
mod state;
mod validation;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use gestor_cache::FileArtifactStore;
use gestor_storage::FsViewSource;
use gestor_template::{ENGINE_VERSION, TemplateEngine};

pub use empresa::{Empresa, EmpresaData, EmpresaRepository};
pub use error::ServerError;
pub use session::{DEFAULT_SESSION_TTL, SESSION_COOKIE, SessionHandle, SessionStore};
pub use validation::Validator;

use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Directory holding view sources.
    pub source_dir: PathBuf,
    /// Directory holding compiled views.
    pub cache_dir: PathBuf,
    /// View file extension.
    pub extension: String,
    /// SQLite connection URL.
    pub database_url: String,
    /// URL prefix of every link and redirect.
    pub base_path: String,
    /// Display name passed to views.
    pub app_name: String,
    /// Idle lifetime of a session.
    pub session_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
            source_dir: PathBuf::from("views"),
            cache_dir: PathBuf::from("storage/cache/views"),
            extension: "html".to_owned(),
            database_url: "sqlite://storage/gestor.db".to_owned(),
            base_path: String::new(),
            app_name: "Gestor System".to_owned(),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

/// Create server configuration from Gestor config.
#[must_use]
pub fn server_config_from_gestor_config(config: &gestor_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        source_dir: config.views_resolved.source_dir.clone(),
        cache_dir: config.views_resolved.cache_dir.clone(),
        extension: config.views_resolved.extension.clone(),
        database_url: config.database.url.clone(),
        base_path: config.app.base_path.clone(),
        app_name: config.app.name.clone(),
        session_ttl: Duration::from_secs(config.server.session_ttl_secs),
    }
}

/// Template engine over a views directory, caching compiled views on disk.
#[must_use]
pub fn create_engine(views: &gestor_config::ViewsConfig) -> TemplateEngine {
    let source = FsViewSource::with_extension(views.source_dir.clone(), &views.extension);
    let store = FileArtifactStore::new(views.cache_dir.clone(), ENGINE_VERSION);
    TemplateEngine::new(Arc::new(source), Arc::new(store))
}

/// Run the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the server fails to
/// start.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = create_engine(&gestor_config::ViewsConfig {
        source_dir: config.source_dir.clone(),
        cache_dir: config.cache_dir.clone(),
        extension: config.extension.clone(),
    });
    let empresas = EmpresaRepository::connect(&config.database_url).await?;

    let state = Arc::new(AppState {
        engine: Arc::new(engine),
        empresas,
        sessions: Arc::new(SessionStore::with_ttl(config.session_ttl)),
        base_path: config.base_path.clone(),
        app_name: config.app_name.clone(),
    });

    let app = app::create_router(state);

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(address = %addr, views = %config.source_dir.display(), "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
