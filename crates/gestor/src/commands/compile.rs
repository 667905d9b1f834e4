//! `gestor compile` command implementation.

use clap::Args;
use gestor_template::{CompileReport, TemplateEngine, ViewName};

use super::ViewArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the compile command.
#[derive(Args)]
pub(crate) struct CompileArgs {
    /// Views to compile, in dot notation (default: every view).
    names: Vec<String>,

    #[command(flatten)]
    views: ViewArgs,
}

impl CompileArgs {
    /// Execute the compile command.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let engine = self.views.engine()?;
        let report = self.compile(&engine)?;

        for (view, err) in &report.failed {
            output.warning(&format!("{view}: {err}"));
        }
        output.success(&format!("Compiled {} view(s)", report.compiled.len()));

        if report.failed.is_empty() {
            Ok(())
        } else {
            Err(CliError::Compile(format!(
                "{} view(s) failed to compile",
                report.failed.len()
            )))
        }
    }

    fn compile(&self, engine: &TemplateEngine) -> Result<CompileReport, CliError> {
        if self.names.is_empty() {
            return Ok(engine.compile_all()?);
        }

        let mut report = CompileReport::default();
        for name in &self.names {
            let view = ViewName::new(name.as_str())?;
            match engine.compile(&view) {
                Ok(()) => report.compiled.push(view),
                Err(e) => report.failed.push((view, e)),
            }
        }
        Ok(report)
    }
}
