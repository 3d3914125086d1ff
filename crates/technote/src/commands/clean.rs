//! `technote clean` command implementation.

use clap::Args;

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the clean command.
#[derive(Args)]
pub(crate) struct CleanArgs {
    /// Also remove the isolated environment.
    #[arg(long)]
    all: bool,
}

impl CleanArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let report = global.driver()?.clean(self.all)?;

        if report.removed.is_empty() {
            output.info("Nothing to clean");
        }
        for dir in &report.removed {
            output.success(&format!("Removed {}", dir.display()));
        }
        Ok(())
    }
}
