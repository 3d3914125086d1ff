//! CLI command implementations.

pub(crate) mod build;
pub(crate) mod clean;
pub(crate) mod init;
pub(crate) mod refresh_bib;

use std::path::PathBuf;

use clap::Args;
use technote_build::BuildDriver;
use technote_config::{CliSettings, Config};

use crate::error::CliError;

pub(crate) use clean::CleanArgs;
pub(crate) use refresh_bib::RefreshBibArgs;

/// Options shared by every command.
#[derive(Args)]
pub(crate) struct GlobalArgs {
    /// Path to configuration file (default: auto-discover technote.toml).
    #[arg(short, long, global = true, env = "TECHNOTE_CONFIG")]
    config: Option<PathBuf>,

    /// Markdown source directory (overrides config).
    #[arg(long, global = true)]
    source_dir: Option<PathBuf>,

    /// Build output directory (overrides config).
    #[arg(long, global = true)]
    build_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Load the configuration with command-line overrides applied.
    pub(crate) fn load_config(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            source_dir: self.source_dir.clone(),
            build_dir: self.build_dir.clone(),
            ..CliSettings::default()
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }

    /// Build driver for the loaded configuration.
    pub(crate) fn driver(&self) -> Result<BuildDriver, CliError> {
        Ok(BuildDriver::new(self.load_config()?))
    }
}
