//! `technote html` and `technote lint` command implementation.

use technote_build::Target;

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

pub(crate) fn execute(global: &GlobalArgs, target: Target) -> Result<(), CliError> {
    let output = Output::new();
    let driver = global.driver()?;
    let config = driver.config();

    output.detail(&format!(
        "Source: {}",
        config.docs_resolved.source_dir.display()
    ));
    output.detail(&format!("Toolchain: {}", config.toolchain.kind.as_str()));

    let report = driver.build(target)?;

    match target {
        Target::Html => output.success(&format!(
            "Site built successfully to {}",
            report.output_dir.display()
        )),
        Target::Lint => output.success("No problems found"),
    }
    Ok(())
}
