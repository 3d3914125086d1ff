//! `technote init` command implementation.

use technote_build::InitOutcome;

use super::GlobalArgs;
use crate::error::CliError;
use crate::output::Output;

pub(crate) fn execute(global: &GlobalArgs) -> Result<(), CliError> {
    let output = Output::new();
    let driver = global.driver()?;
    let env_dir = driver.environment().dir().display().to_string();

    match driver.init_environment()? {
        InitOutcome::AlreadyInitialized => {
            output.info(&format!("Environment already initialized at {env_dir}"));
        }
        InitOutcome::Provisioned => {
            output.success(&format!("Environment initialized at {env_dir}"));
        }
    }
    Ok(())
}
