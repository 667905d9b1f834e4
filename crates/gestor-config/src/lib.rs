//! Configuration management for Gestor.
//!
//! Parses `gestor.toml` with serde and discovers it in the current directory
//! or any parent. CLI settings are applied on top via [`CliSettings`].
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8000
//!
//! [views]
//! source_dir = "views"
//! cache_dir = "storage/cache/views"
//! extension = "html"
//!
//! [database]
//! url = "sqlite://storage/gestor.db"
//!
//! [app]
//! base_path = ""
//! name = "Gestor System"
//! ```
//!
//! ## Environment Variable Expansion
//!
//! String values support `${VAR}` (error if unset) and `${VAR:-default}`.
//!
//! Expanded fields:
//! - `server.host`
//! - `views.source_dir`, `views.cache_dir`
//! - `database.url`
//! - `app.base_path`, `app.name`
//!
//! Relative paths, including the file path of a `sqlite:` URL, resolve
//! against the directory holding the config file.

mod expand;

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "gestor.toml";

const DEFAULT_SOURCE_DIR: &str = "views";
const DEFAULT_CACHE_DIR: &str = "storage/cache/views";
const DEFAULT_EXTENSION: &str = "html";
const DEFAULT_DATABASE_URL: &str = "sqlite://storage/gestor.db";

/// CLI settings that override configuration file values.
///
/// Only `Some` fields override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override the views directory.
    pub source_dir: Option<PathBuf>,
    /// Override the compiled view cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Override the database URL.
    pub database_url: Option<String>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Views configuration as written in TOML.
    views: ViewsConfigRaw,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Application settings.
    pub app: AppConfig,

    /// Resolved views configuration (set after loading).
    #[serde(skip)]
    pub views_resolved: ViewsConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Seconds a session may stay idle before it is dropped.
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
            session_ttl_secs: 86_400,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ViewsConfigRaw {
    source_dir: Option<String>,
    cache_dir: Option<String>,
    extension: Option<String>,
}

/// Resolved views configuration with absolute paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ViewsConfig {
    /// Directory holding view sources.
    pub source_dir: PathBuf,
    /// Directory holding compiled artifacts.
    pub cache_dir: PathBuf,
    /// Source file extension, without the leading dot.
    pub extension: String,
}

/// Database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlx` connection URL. Only SQLite is supported.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_owned(),
        }
    }
}

/// Application settings exposed to views.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// URL prefix the application is mounted under (`""` or `/gestor`).
    pub base_path: String,
    /// Display name.
    pub name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            name: "Gestor System".to_owned(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`database.url`").
        field: String,
        /// Error message (e.g., "${`GESTOR_DB`} not set").
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Resolve the file path of a `sqlite:` URL against `base`.
///
/// In-memory databases and absolute paths are returned unchanged, as is
/// anything that is not a SQLite URL (validation rejects those later).
fn resolve_sqlite_url(url: &str, base: &Path) -> String {
    let Some(rest) = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    else {
        return url.to_owned();
    };
    let (path, query) = rest.split_once('?').map_or((rest, None), |(p, q)| (p, Some(q)));

    if path.is_empty() || path.starts_with(":memory:") || Path::new(path).is_absolute() {
        return url.to_owned();
    }

    let resolved = base.join(path);
    match query {
        Some(query) => format!("sqlite://{}?{query}", resolved.display()),
        None => format!("sqlite://{}", resolved.display()),
    }
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise,
    /// searches for `gestor.toml` in the current directory and its parents,
    /// falling back to defaults relative to the current directory.
    ///
    /// CLI settings are applied after loading and path resolution.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Directory the config file lives in, or the current directory.
    #[must_use]
    pub fn base_dir(&self) -> PathBuf {
        self.config_path
            .as_ref()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default()
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(source_dir) = &settings.source_dir {
            self.views_resolved.source_dir.clone_from(source_dir);
        }
        if let Some(cache_dir) = &settings.cache_dir {
            self.views_resolved.cache_dir.clone_from(cache_dir);
        }
        if let Some(url) = &settings.database_url {
            self.database.url.clone_from(url);
        }
    }

    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            views: ViewsConfigRaw::default(),
            database: DatabaseConfig {
                url: resolve_sqlite_url(DEFAULT_DATABASE_URL, base),
            },
            app: AppConfig::default(),
            views_resolved: ViewsConfig {
                source_dir: base.join(DEFAULT_SOURCE_DIR),
                cache_dir: base.join(DEFAULT_CACHE_DIR),
                extension: DEFAULT_EXTENSION.to_owned(),
            },
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port cannot be 0".to_owned()));
        }
        if self.server.session_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "server.session_ttl_secs cannot be 0".to_owned(),
            ));
        }

        let extension = &self.views_resolved.extension;
        require_non_empty(extension, "views.extension")?;
        if extension.starts_with('.') {
            return Err(ConfigError::Validation(
                "views.extension must not start with a dot".to_owned(),
            ));
        }

        if !self.database.url.starts_with("sqlite:") {
            return Err(ConfigError::Validation(
                "database.url must start with sqlite:".to_owned(),
            ));
        }

        let base_path = &self.app.base_path;
        if !base_path.is_empty() && (!base_path.starts_with('/') || base_path.ends_with('/')) {
            return Err(ConfigError::Validation(
                "app.base_path must be empty or start with / and not end with /".to_owned(),
            ));
        }

        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;
        expand::expand_opt(&mut self.views.source_dir, "views.source_dir")?;
        expand::expand_opt(&mut self.views.cache_dir, "views.cache_dir")?;
        self.database.url = expand::expand_env(&self.database.url, "database.url")?;
        self.app.base_path = expand::expand_env(&self.app.base_path, "app.base_path")?;
        self.app.name = expand::expand_env(&self.app.name, "app.name")?;
        Ok(())
    }

    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.views_resolved = ViewsConfig {
            source_dir: resolve(self.views.source_dir.as_deref(), DEFAULT_SOURCE_DIR),
            cache_dir: resolve(self.views.cache_dir.as_deref(), DEFAULT_CACHE_DIR),
            extension: self
                .views
                .extension
                .clone()
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned()),
        };
        self.database.url = resolve_sqlite_url(&self.database.url, config_dir);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/srv/gestor"));

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.session_ttl_secs, 86_400);
        assert_eq!(
            config.views_resolved,
            ViewsConfig {
                source_dir: PathBuf::from("/srv/gestor/views"),
                cache_dir: PathBuf::from("/srv/gestor/storage/cache/views"),
                extension: "html".to_owned(),
            }
        );
        assert_eq!(config.database.url, "sqlite:///srv/gestor/storage/gestor.db");
        assert_eq!(config.app.base_path, "");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.url, "sqlite://storage/gestor.db");
        assert_eq!(config.app.name, "Gestor System");
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[views]
source_dir = "app/Views"
extension = "php"

[database]
url = "sqlite://data/app.db?mode=rwc"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(config.views_resolved.source_dir, PathBuf::from("/project/app/Views"));
        assert_eq!(
            config.views_resolved.cache_dir,
            PathBuf::from("/project/storage/cache/views")
        );
        assert_eq!(config.views_resolved.extension, "php");
        assert_eq!(config.database.url, "sqlite:///project/data/app.db?mode=rwc");
    }

    #[test]
    fn test_sqlite_url_resolution() {
        let base = Path::new("/p");

        assert_eq!(resolve_sqlite_url("sqlite::memory:", base), "sqlite::memory:");
        assert_eq!(resolve_sqlite_url("sqlite:///abs/x.db", base), "sqlite:///abs/x.db");
        assert_eq!(resolve_sqlite_url("sqlite:x.db", base), "sqlite:///p/x.db");
        assert_eq!(resolve_sqlite_url("mysql://db", base), "mysql://db");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            r#"
[server]
host = "${GESTOR_TEST_LOAD_HOST:-0.0.0.0}"
port = 9000

[app]
base_path = "/gestor"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path), None).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.app.base_path, "/gestor");
        assert_eq!(config.views_resolved.source_dir, dir.path().join("views"));
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.base_dir(), dir.path());
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/gestor.toml")), None).unwrap_err();

        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let settings = CliSettings {
            port: Some(9090),
            source_dir: Some(PathBuf::from("/custom/views")),
            database_url: Some("sqlite::memory:".to_owned()),
            ..Default::default()
        };

        config.apply_cli_settings(&settings);

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.views_resolved.source_dir, PathBuf::from("/custom/views"));
        assert_eq!(config.views_resolved.cache_dir, PathBuf::from("/test/storage/cache/views"));
        assert_eq!(config.database.url, "sqlite::memory:");
    }

    #[test]
    fn test_validation_errors() {
        let cases: [(&str, fn(&mut Config)); 7] = [
            ("server.host", |c| c.server.host.clear()),
            ("server.port", |c| c.server.port = 0),
            ("server.session_ttl_secs", |c| c.server.session_ttl_secs = 0),
            ("views.extension", |c| c.views_resolved.extension = ".html".to_owned()),
            ("database.url", |c| c.database.url = "postgres://db".to_owned()),
            ("app.base_path", |c| c.app.base_path = "gestor".to_owned()),
            ("app.base_path", |c| c.app.base_path = "/gestor/".to_owned()),
        ];

        for (field, break_config) in cases {
            let mut config = Config::default_with_base(Path::new("/test"));
            break_config(&mut config);

            let err = config.validate().unwrap_err();
            assert!(
                matches!(&err, ConfigError::Validation(msg) if msg.contains(field)),
                "expected error on {field}, got {err}"
            );
        }
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[server\nport = 1").unwrap();

        let err = Config::load(Some(&path), None).unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
