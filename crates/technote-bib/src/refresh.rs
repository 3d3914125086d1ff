//! Regenerates the Bibliography Data Set from upstream sources.
//!
//! Refresh runs in two phases. The fetch phase downloads and parses every
//! source; nothing is written unless all of them succeed. The write phase
//! replaces each file through a temp file and rename, so readers never see a
//! half-written `.bib` file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ureq::Agent;

use crate::error::FetchError;
use crate::parser::parse_bibtex;

/// Response bodies larger than this are rejected.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// A bibliography file to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// File name written into the output directory.
    pub name: String,
    /// URL to fetch.
    pub url: String,
}

/// Retrieves the text of a bibliography source.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetches `http(s)://` URLs with ureq and `file://` URLs from disk.
pub struct HttpFetcher {
    agent: Agent,
}

impl HttpFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if let Some(path) = url.strip_prefix("file://") {
            return fs::read_to_string(path).map_err(|e| FetchError::Unreachable {
                url: url.to_owned(),
                message: e.to_string(),
            });
        }

        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| FetchError::Unreachable {
                url: url.to_owned(),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status,
            });
        }

        response
            .into_body()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_string()
            .map_err(|e| FetchError::Unreachable {
                url: url.to_owned(),
                message: e.to_string(),
            })
    }
}

/// Summary of a successful refresh.
#[derive(Debug, PartialEq, Eq)]
pub struct RefreshReport {
    /// Files written, in source order.
    pub files: Vec<PathBuf>,
    /// Total entries across all written files.
    pub entries: usize,
}

/// Fetch every source and overwrite the matching files in `output_dir`.
///
/// Never touches version control: the refreshed files are left in the working
/// tree for review.
pub fn refresh_bibliography(
    sources: &[Source],
    fetcher: &dyn Fetch,
    output_dir: &Path,
) -> Result<RefreshReport, FetchError> {
    let mut fetched = Vec::with_capacity(sources.len());
    let mut entries = 0;

    for source in sources {
        tracing::info!(url = %source.url, "Fetching bibliography");
        let content = fetcher.fetch(&source.url)?;
        let parsed = parse_bibtex(&content).map_err(|e| FetchError::Invalid {
            url: source.url.clone(),
            source: e,
        })?;
        tracing::debug!(name = %source.name, entries = parsed.len(), "Parsed bibliography");
        entries += parsed.len();
        fetched.push((source, content));
    }

    fs::create_dir_all(output_dir).map_err(|e| FetchError::Write {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::with_capacity(fetched.len());
    for (source, content) in fetched {
        let path = output_dir.join(&source.name);
        write_replacing(&path, &content)?;
        files.push(path);
    }

    Ok(RefreshReport { files, entries })
}

/// Write `content` to `path` via a sibling temp file and rename.
fn write_replacing(path: &Path, content: &str) -> Result<(), FetchError> {
    let write_err = |e| FetchError::Write {
        path: path.to_path_buf(),
        source: e,
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&tmp, content).map_err(write_err)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(e));
    }
    Ok(())
}
