//! Build driver error types.

use std::fmt;
use std::path::PathBuf;

use technote_bib::FetchError;

/// The isolated environment is missing, outdated or could not be provisioned.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("environment at {} is not initialized; run `technote init`", dir.display())]
    NotInitialized { dir: PathBuf },
    #[error("environment at {} was provisioned for different settings; run `technote init`", dir.display())]
    Stale { dir: PathBuf },
    #[error("program '{program}' not found")]
    ToolMissing { program: String },
    #[error("provisioning step `{step}` failed ({status}):\n{diagnostic}")]
    ProvisionFailed {
        step: String,
        status: String,
        diagnostic: String,
    },
    #[error("cannot prepare environment at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The documentation toolchain failed for a target.
///
/// `diagnostic` holds the tool's own output, unmodified.
#[derive(Debug)]
pub struct ToolchainError {
    pub target: String,
    /// Exit code of an external toolchain, if it exited normally.
    pub status: Option<i32>,
    pub diagnostic: String,
}

impl fmt::Display for ToolchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} build failed", self.target)?;
        if let Some(code) = self.status {
            write!(f, " (exit status {code})")?;
        }
        write!(f, ":\n{}", self.diagnostic.trim_end())
    }
}

impl std::error::Error for ToolchainError {}

/// Error returned by [`BuildDriver`](crate::BuildDriver) operations.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("cannot remove {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },
}
