//! CLI command implementations.

pub(crate) mod cache;
pub(crate) mod compile;
pub(crate) mod render;
pub(crate) mod serve;

use std::path::PathBuf;

use clap::Args;
use gestor_config::{CliSettings, Config};
use gestor_template::TemplateEngine;

pub(crate) use cache::CacheCommand;
pub(crate) use compile::CompileArgs;
pub(crate) use render::RenderArgs;
pub(crate) use serve::ServeArgs;

use crate::error::CliError;

/// Options shared by the commands that work on views.
#[derive(Args, Debug, Default)]
pub(crate) struct ViewArgs {
    /// Path to configuration file (default: auto-discover gestor.toml).
    #[arg(short, long, env = "GESTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Views directory (overrides config).
    #[arg(long)]
    views: Option<PathBuf>,

    /// Compiled view cache directory (overrides config).
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

impl ViewArgs {
    /// Load the configuration with these overrides applied.
    pub(crate) fn load_config(&self) -> Result<Config, CliError> {
        let settings = CliSettings {
            source_dir: self.views.clone(),
            cache_dir: self.cache_dir.clone(),
            ..CliSettings::default()
        };
        Ok(Config::load(self.config.as_deref(), Some(&settings))?)
    }

    /// Template engine over the configured views and cache.
    pub(crate) fn engine(&self) -> Result<TemplateEngine, CliError> {
        let config = self.load_config()?;
        Ok(gestor_server::create_engine(&config.views_resolved))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;

    /// A project directory with a config file, a layout and two views.
    pub(crate) fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("gestor.toml"),
            "[views]\nsource_dir = \"views\"\ncache_dir = \"cache\"\n",
        )
        .unwrap();
        write_view(dir.path(), "layouts/main.html", "<main>@yield('content')</main>");
        write_view(
            dir.path(),
            "home.html",
            "@extends('layouts.main')\n@section('content')Hi {{ $name ?? 'there' }}@endsection",
        );
        write_view(dir.path(), "about.html", "About");
        dir
    }

    pub(crate) fn write_view(root: &Path, path: &str, content: &str) {
        let path = root.join("views").join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub(crate) fn view_args(dir: &TempDir) -> ViewArgs {
        ViewArgs {
            config: Some(dir.path().join("gestor.toml")),
            ..ViewArgs::default()
        }
    }

    #[test]
    fn test_load_config_resolves_against_config_file() {
        let dir = project();

        let config = view_args(&dir).load_config().unwrap();

        assert_eq!(config.views_resolved.source_dir, dir.path().join("views"));
        assert_eq!(config.views_resolved.cache_dir, dir.path().join("cache"));
    }

    #[test]
    fn test_load_config_applies_overrides() {
        let dir = project();
        let args = ViewArgs {
            views: Some(dir.path().join("other")),
            ..view_args(&dir)
        };

        let config = args.load_config().unwrap();

        assert_eq!(config.views_resolved.source_dir, dir.path().join("other"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = TempDir::new().unwrap();
        let args = ViewArgs {
            config: Some(dir.path().join("missing.toml")),
            ..ViewArgs::default()
        };

        assert!(matches!(
            args.load_config(),
            Err(CliError::Config(gestor_config::ConfigError::NotFound(_)))
        ));
    }
}
