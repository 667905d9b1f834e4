//! `gestor cache` command implementation.

use clap::Subcommand;

use super::ViewArgs;
use crate::error::CliError;
use crate::output::Output;

/// Compiled view cache subcommands.
#[derive(Subcommand)]
pub(crate) enum CacheCommand {
    /// Delete every compiled view.
    Clear {
        #[command(flatten)]
        views: ViewArgs,
    },
}

impl CacheCommand {
    /// Execute the cache command.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        match self {
            Self::Clear { views } => {
                let removed = views.engine()?.clear()?;
                Output::new().success(&format!("Removed {removed} compiled view(s)"));
                Ok(())
            }
        }
    }
}
