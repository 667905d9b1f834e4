//! `gestor serve` command implementation.

use std::path::PathBuf;

use clap::Args;
use gestor_config::{CliSettings, Config};
use gestor_server::{run_server, server_config_from_gestor_config};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover gestor.toml).
    #[arg(short, long, env = "GESTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Views directory (overrides config).
    #[arg(long)]
    views: Option<PathBuf>,

    /// Compiled view cache directory (overrides config).
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// SQLite database URL (overrides config).
    #[arg(long, env = "GESTOR_DATABASE_URL")]
    database: Option<String>,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the server fails to start.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            source_dir: self.views,
            cache_dir: self.cache_dir,
            database_url: self.database,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        output.info(&format!(
            "Starting server on http://{}:{}{}",
            config.server.host, config.server.port, config.app.base_path
        ));
        output.info(&format!(
            "Views directory: {}",
            config.views_resolved.source_dir.display()
        ));
        output.info(&format!(
            "Cache directory: {}",
            config.views_resolved.cache_dir.display()
        ));
        output.info(&format!("Database: {}", config.database.url));

        let server_config = server_config_from_gestor_config(&config);
        run_server(server_config)
            .await
            .map_err(|e| CliError::Server(e.to_string()))?;

        Ok(())
    }
}
