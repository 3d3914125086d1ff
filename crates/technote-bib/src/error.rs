//! Bibliography error types.

use std::path::PathBuf;

use crate::parser::ParseError;

/// Error loading the Bibliography Data Set.
#[derive(Debug, thiserror::Error)]
pub enum BibError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Parse { path: PathBuf, source: ParseError },
}

/// Error refreshing the Bibliography Data Set from upstream.
///
/// Whenever one of these is returned before the write phase, the bibliography
/// directory has not been touched.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("cannot reach {url}: {message}")]
    Unreachable { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} is not valid BibTeX: {source}")]
    Invalid { url: String, source: ParseError },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
