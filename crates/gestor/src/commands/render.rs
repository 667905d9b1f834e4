//! `gestor render` command implementation.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use gestor_template::{NoSession, RenderContext};

use super::ViewArgs;
use crate::error::CliError;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// View name in dot notation, e.g. `empresa.index`.
    view: String,

    /// JSON file holding an object of view variables.
    #[arg(short, long)]
    data: Option<PathBuf>,

    #[command(flatten)]
    views: ViewArgs,
}

impl RenderArgs {
    /// Execute the render command, writing the output to stdout.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let html = self.render()?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(html.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    fn render(&self) -> Result<String, CliError> {
        let ctx = match &self.data {
            Some(path) => load_data(path)?,
            None => RenderContext::new(),
        };
        let engine = self.views.engine()?;
        Ok(engine.render(&self.view, &ctx, &NoSession)?)
    }
}

fn load_data(path: &Path) -> Result<RenderContext, CliError> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    Ok(RenderContext::from_serialize(&value)?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::commands::tests::{project, view_args};

    #[test]
    fn test_render_with_layout() {
        let dir = project();
        let args = RenderArgs {
            view: "home".to_owned(),
            data: None,
            views: view_args(&dir),
        };

        assert_eq!(args.render().unwrap(), "<main>Hi there</main>");
        assert!(dir.path().join("cache").is_dir());
    }

    #[test]
    fn test_render_with_data_file() {
        let dir = project();
        let data = dir.path().join("data.json");
        std::fs::write(&data, r#"{"name": "<Ana>"}"#).unwrap();
        let args = RenderArgs {
            view: "home".to_owned(),
            data: Some(data),
            views: view_args(&dir),
        };

        assert_eq!(args.render().unwrap(), "<main>Hi &lt;Ana&gt;</main>");
    }

    #[test]
    fn test_render_rejects_non_object_data() {
        let dir = project();
        let data = dir.path().join("data.json");
        std::fs::write(&data, "[1, 2]").unwrap();
        let args = RenderArgs {
            view: "home".to_owned(),
            data: Some(data),
            views: view_args(&dir),
        };

        assert!(matches!(args.render(), Err(CliError::Template(_))));
    }

    #[test]
    fn test_render_missing_view() {
        let dir = project();
        let args = RenderArgs {
            view: "missing".to_owned(),
            data: None,
            views: view_args(&dir),
        };

        assert!(matches!(
            args.render(),
            Err(CliError::Template(e)) if e.is_not_found()
        ));
    }
}
