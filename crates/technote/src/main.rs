//! Technote CLI - document build driver.
//!
//! Provides commands for:
//! - `init`: Provision the isolated build environment
//! - `html`: Render documents to HTML
//! - `lint`: Check citations and links
//! - `clean`: Remove build output
//! - `refresh-bib`: Fetch upstream bibliography files

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CleanArgs, GlobalArgs, RefreshBibArgs};
use output::Output;

/// Technote - build driver for technical notes.
#[derive(Parser)]
#[command(name = "technote", version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the isolated build environment.
    Init,
    /// Render the document set to HTML.
    Html,
    /// Check citations and cross-document links.
    Lint,
    /// Remove build output.
    Clean(CleanArgs),
    /// Regenerate bibliography files from upstream.
    RefreshBib(RefreshBibArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise RUST_LOG, falling back to WARN
    let filter = if cli.global.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init => commands::init::execute(&cli.global),
        Commands::Html => commands::build::execute(&cli.global, technote_build::Target::Html),
        Commands::Lint => commands::build::execute(&cli.global, technote_build::Target::Lint),
        Commands::Clean(args) => args.execute(&cli.global),
        Commands::RefreshBib(args) => args.execute(&cli.global),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
