//! Site generation errors.

use std::fmt;
use std::path::PathBuf;

use technote_bib::BibError;

/// A problem found in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentProblem {
    /// Document path relative to the source directory.
    pub document: String,
    pub message: String,
}

impl fmt::Display for DocumentProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.document, self.message)
    }
}

/// Error returned by the static site builder.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid exclude pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
    #[error(transparent)]
    Bibliography(#[from] BibError),
    /// Citations or includes that did not resolve.
    #[error("{}", join_lines(.0))]
    Unresolved(Vec<DocumentProblem>),
}

pub(crate) fn join_lines(problems: &[DocumentProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Attach a path to an I/O error.
pub(crate) fn io_err(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> SiteError {
    let path = path.into();
    move |source| SiteError::Io { path, source }
}
