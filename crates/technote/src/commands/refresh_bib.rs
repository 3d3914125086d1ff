//! `technote refresh-bib` command implementation.

use std::path::PathBuf;

use clap::Args;
use technote_bib::HttpFetcher;

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the refresh-bib command.
#[derive(Args)]
pub(crate) struct RefreshBibArgs {
    /// Directory to write bibliography files to (default: bibliography.dir).
    #[arg(short, long)]
    dir: Option<PathBuf>,
}

impl RefreshBibArgs {
    pub(crate) fn execute(self, global: &GlobalArgs) -> Result<(), CliError> {
        let output = Output::new();
        let driver = global.driver()?;
        let bib = &driver.config().bibliography_resolved;
        let dir = self.dir.unwrap_or_else(|| bib.dir.clone());

        for source in &bib.upstream {
            output.detail(&format!("Fetching {}", source.url));
        }
        let fetcher = HttpFetcher::new(bib.timeout);
        let report = driver.refresh_bibliography(Some(&dir), &fetcher)?;

        output.success(&format!(
            "Wrote {} files ({} entries) to {}",
            report.files.len(),
            report.entries,
            dir.display()
        ));
        output.info("Review the changes and commit them.");
        Ok(())
    }
}
